//! Suggestion storage using SQLite
//!
//! One set of tables per partition, created in bulk at ingestion time
//! and read-only afterward. The query layer lives here too: it returns
//! page rows with their algorithm suggestions already aggregated, in
//! canonical page-id order so downstream fan-out can pair results 1:1.

mod schema;

pub use schema::create_partition_sql;

use crate::error::{Error, Result};
use crate::models::{PageSuggestions, QueryMode, Source, SourceDetails, SourceInfo, Suggestion};
use crate::rowcount::RowCounts;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use tracing::debug;

/// A page row staged for insertion
#[derive(Debug, Clone)]
pub struct PageRow {
    pub row_num: i64,
    /// 0 when the page has no algorithm suggestions
    pub row_num_ima: i64,
    pub id: i64,
    pub title: String,
}

/// An image row staged for insertion, keyed by (id, source)
#[derive(Debug, Clone)]
pub struct ImageRow {
    pub id: String,
    pub confidence_rating: String,
    pub source: String,
    pub dataset_id: String,
    pub insertion_ts: f64,
    pub found_on: String,
}

/// A page-image association staged for insertion
#[derive(Debug, Clone)]
pub struct LinkRow {
    pub page_id: i64,
    pub image_id: String,
    pub image_source: String,
}

/// Flat row shape returned by the page queries; image columns are null
/// for pages without suggestions under the all-sources join.
#[derive(Debug, FromRow)]
struct PageImageRow {
    page_id: i64,
    title: String,
    filename: Option<String>,
    confidence_rating: Option<String>,
    origin_wiki: Option<String>,
    dataset_id: Option<String>,
    found_on: Option<String>,
}

/// Suggestion database handle
#[derive(Clone)]
pub struct SuggestionDb {
    pool: SqlitePool,
}

impl SuggestionDb {
    /// Open (or create) the suggestion database at the given path
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Drop and recreate one partition's tables
    pub async fn create_partition(&self, wiki: &str) -> Result<()> {
        sqlx::query(&create_partition_sql(wiki))
            .execute(&self.pool)
            .await
            .map_err(|e| internal(wiki, "create tables", e))?;
        Ok(())
    }

    /// Remove a partition's tables entirely, used when ingestion of its
    /// source file fails partway through
    pub async fn drop_partition(&self, wiki: &str) -> Result<()> {
        let sql = format!(
            "DROP TABLE IF EXISTS {wiki}_page; DROP TABLE IF EXISTS {wiki}_image; DROP TABLE IF EXISTS {wiki}_image_page;"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| internal(wiki, "drop tables", e))?;
        Ok(())
    }

    /// Whether a partition's tables exist
    pub async fn partition_exists(&self, wiki: &str) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(format!("{}_page", wiki))
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    /// List all partitions present in the store
    pub async fn list_partitions(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name LIKE '%wiki_page' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names
            .into_iter()
            .filter_map(|n| n.strip_suffix("_page").map(str::to_string))
            .collect())
    }

    // ===== Ingestion inserts =====

    /// Batch-insert page rows
    pub async fn insert_pages(&self, wiki: &str, rows: &[PageRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let placeholders = placeholders(4, rows.len());
        let sql = format!(
            "INSERT INTO {}_page (row_num, row_num_ima, id, title) VALUES {}",
            wiki, placeholders
        );
        let mut query = sqlx::query(&sql);
        for row in rows {
            query = query
                .bind(row.row_num)
                .bind(row.row_num_ima)
                .bind(row.id)
                .bind(&row.title);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| internal(wiki, "insert pages", e))?;
        Ok(())
    }

    /// Batch-insert image rows, ignoring (id, source) duplicates.
    ///
    /// A single idempotent insert rather than insert-then-retry: the
    /// same image legitimately reappears when suggested for several
    /// pages, and on reloads of the same file. Returns the number of
    /// rows actually written so the caller can log skipped duplicates.
    pub async fn insert_images(&self, wiki: &str, rows: &[ImageRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let placeholders = placeholders(6, rows.len());
        let sql = format!(
            "INSERT OR IGNORE INTO {}_image (id, confidence_rating, source, dataset_id, insertion_ts, found_on) VALUES {}",
            wiki, placeholders
        );
        let mut query = sqlx::query(&sql);
        for row in rows {
            query = query
                .bind(&row.id)
                .bind(&row.confidence_rating)
                .bind(&row.source)
                .bind(&row.dataset_id)
                .bind(row.insertion_ts)
                .bind(&row.found_on);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| internal(wiki, "insert images", e))?;
        Ok(result.rows_affected())
    }

    /// Batch-insert page-image links, ignoring duplicate triples
    pub async fn insert_links(&self, wiki: &str, rows: &[LinkRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let placeholders = placeholders(3, rows.len());
        let sql = format!(
            "INSERT OR IGNORE INTO {}_image_page (page_id, image_id, image_source) VALUES {}",
            wiki, placeholders
        );
        let mut query = sqlx::query(&sql);
        for row in rows {
            query = query
                .bind(row.page_id)
                .bind(&row.image_id)
                .bind(&row.image_source);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| internal(wiki, "insert links", e))?;
        Ok(())
    }

    // ===== Row counts =====

    /// Highest assigned row numbers for a partition, computed from the
    /// tables. Used at startup for stores populated by a previous run.
    pub async fn max_row_counts(&self, wiki: &str) -> Result<RowCounts> {
        let sql = format!(
            "SELECT COALESCE(MAX(row_num), 0), COALESCE(MAX(row_num_ima), 0) FROM {}_page",
            wiki
        );
        let (max_row_num, max_row_num_ima): (i64, i64) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| internal(wiki, "count rows", e))?;
        Ok(RowCounts {
            max_row_num,
            max_row_num_ima,
        })
    }

    // ===== Query layer =====

    /// Map explicit page ids to their row numbers under the given mode.
    /// Ids without a row number for that mode (unknown pages, or pages
    /// without suggestions when filtering to the algorithm source) are
    /// dropped.
    pub async fn fetch_row_nums(&self, wiki: &str, mode: QueryMode, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let in_list = std::iter::repeat("?")
            .take(ids.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = match mode {
            QueryMode::ImaOnly => format!(
                "SELECT row_num_ima FROM {}_page WHERE row_num_ima >= 1 AND id IN ({}) ORDER BY row_num_ima",
                wiki, in_list
            ),
            QueryMode::AllSources => format!(
                "SELECT row_num FROM {}_page WHERE id IN ({}) ORDER BY row_num",
                wiki, in_list
            ),
        };
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal(wiki, "retrieve page ids", e))
    }

    /// Fetch pages with their algorithm suggestions aggregated.
    ///
    /// With explicit `row_nums` the result is restricted to exactly
    /// that set and `offset` is ignored; pages always come back in
    /// page-id order regardless of the order row numbers were supplied,
    /// because the provider fan-out downstream pairs results by
    /// position.
    pub async fn fetch_pages(
        &self,
        wiki: &str,
        mode: QueryMode,
        limit: usize,
        offset: usize,
        row_nums: Option<&[i64]>,
    ) -> Result<Vec<PageSuggestions>> {
        let offset = if row_nums.is_some() { 0 } else { offset };

        let row_col = match mode {
            QueryMode::ImaOnly => "row_num_ima",
            QueryMode::AllSources => "row_num",
        };
        let mut conditions = match mode {
            // Pages without algorithm suggestions are excluded by the
            // database, not filtered after the fact.
            QueryMode::ImaOnly => vec!["row_num_ima >= 1".to_string()],
            QueryMode::AllSources => vec!["1".to_string()],
        };
        if let Some(nums) = row_nums {
            let in_list = std::iter::repeat("?")
                .take(nums.len().max(1))
                .collect::<Vec<_>>()
                .join(",");
            conditions.push(format!("{} IN ({})", row_col, in_list));
        }
        let where_clause = conditions.join(" AND ");

        let join = match mode {
            QueryMode::ImaOnly => "INNER JOIN",
            QueryMode::AllSources => "LEFT JOIN",
        };
        let sql = format!(
            r#"SELECT
                p.id AS page_id,
                p.title,
                img.id AS filename,
                img.confidence_rating,
                img.source AS origin_wiki,
                img.dataset_id,
                img.found_on
            FROM (
                SELECT id, title FROM {wiki}_page
                WHERE {where_clause}
                ORDER BY id
                LIMIT ? OFFSET ?
            ) p
            {join} {wiki}_image_page link ON link.page_id = p.id
            {join} {wiki}_image img
                ON img.id = link.image_id AND img.source = link.image_source
            ORDER BY p.id, img.id, img.source"#,
        );

        let mut query = sqlx::query_as::<_, PageImageRow>(&sql);
        if let Some(nums) = row_nums {
            if nums.is_empty() {
                // IN () is a syntax error; a single impossible value
                // keeps the query shape uniform.
                query = query.bind(-1i64);
            }
            for num in nums {
                query = query.bind(num);
            }
        }
        let rows = query
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| internal(wiki, "retrieve image matching algorithm results", e))?;

        Ok(group_rows(wiki, rows))
    }
}

/// Collapse the flat join rows into per-page suggestion lists. Input is
/// ordered by page id, so one forward pass suffices.
fn group_rows(wiki: &str, rows: Vec<PageImageRow>) -> Vec<PageSuggestions> {
    let mut pages: Vec<PageSuggestions> = Vec::new();
    for row in rows {
        if pages.last().map(|p| p.page_id) != Some(row.page_id) {
            pages.push(PageSuggestions {
                project: wiki.to_string(),
                page: row.title.clone(),
                page_id: row.page_id,
                suggestions: Vec::new(),
            });
        }
        if let Some(filename) = row.filename {
            let page = pages.last_mut().expect("pushed above");
            page.suggestions.push(Suggestion {
                filename,
                confidence_rating: row.confidence_rating.unwrap_or_default(),
                source: SourceInfo {
                    name: Source::Ima,
                    details: SourceDetails {
                        dataset_id: row.dataset_id,
                        origin_wiki: row.origin_wiki,
                        found_on: row.found_on.filter(|f| !f.is_empty()),
                    },
                },
            });
        }
    }
    pages
}

/// `(?,?,..),(?,?,..),..` for a batch insert
fn placeholders(cols: usize, rows: usize) -> String {
    let row = format!("({})", vec!["?"; cols].join(","));
    vec![row; rows].join(",")
}

/// Storage faults never surface raw; the caller sees the partition name
/// and the operation that failed.
fn internal(wiki: &str, op: &str, err: sqlx::Error) -> Error {
    tracing::error!("storage fault in {} for {}: {}", op, wiki, err);
    Error::Internal(format!("Unable to {} for {}", op, wiki))
}
