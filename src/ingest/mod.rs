//! Batch ingestion of per-partition TSV result files
//!
//! Each file holds the matching algorithm's output for one partition:
//! zero or more consecutive rows per page, one row per candidate image,
//! or a single sentinel row with an empty image id for pages with no
//! candidates. Rows are streamed, grouped per page to assign dense row
//! numbers, and flushed in fixed-size chunks so peak memory does not
//! depend on file size.
//!
//! Ingestion runs once per partition before any query is served; a
//! failing file drops its partition and does not stop the others.

use crate::error::{Error, Result};
use crate::rowcount::{RowCountIndex, RowCounts};
use crate::store::{ImageRow, LinkRow, PageRow, SuggestionDb};
use crate::wiki;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Exact ordered header row every TSV file must start with
pub const EXPECTED_HEADERS: [&str; 9] = [
    "page_id",
    "page_title",
    "image_id",
    "confidence_rating",
    "source",
    "dataset_id",
    "insertion_ts",
    "wiki",
    "found_on",
];

/// Empty string and the literal null marker both mean "no image"
fn is_empty_value(value: &str) -> bool {
    value.is_empty() || value == "NULL"
}

fn validate_headers(line: &str) -> Result<()> {
    let headers: Vec<&str> = line.split('\t').collect();
    if headers.len() != EXPECTED_HEADERS.len() {
        return Err(Error::Validation(
            "TSV headers do not match expected headers".to_string(),
        ));
    }
    for (header, expected) in headers.iter().zip(EXPECTED_HEADERS.iter()) {
        if header != expected {
            return Err(Error::Validation(format!(
                "Expected {} to equal {}",
                header, expected
            )));
        }
    }
    Ok(())
}

/// Page currently being accumulated; its row numbers are assigned only
/// once a row for a different page (or EOF) arrives
struct PendingPage {
    id: i64,
    title: String,
    has_images: bool,
}

/// Rows staged for the next chunk flush
#[derive(Default)]
struct Batch {
    pages: Vec<PageRow>,
    images: Vec<ImageRow>,
    links: Vec<LinkRow>,
    rows_seen: usize,
}

impl Batch {
    async fn flush(&mut self, db: &SuggestionDb, wiki: &str) -> Result<()> {
        db.insert_pages(wiki, &self.pages).await?;
        let written = db.insert_images(wiki, &self.images).await?;
        if (written as usize) < self.images.len() {
            warn!(
                "{}: ignored {} duplicate image row(s)",
                wiki,
                self.images.len() - written as usize
            );
        }
        db.insert_links(wiki, &self.links).await?;
        self.pages.clear();
        self.images.clear();
        self.links.clear();
        self.rows_seen = 0;
        Ok(())
    }
}

/// Ingest one partition's TSV file, recreating its tables wholesale.
/// Returns the final row counts on success.
pub async fn ingest_file(
    db: &SuggestionDb,
    wiki: &str,
    path: &Path,
    insert_chunk: usize,
) -> Result<RowCounts> {
    let file = File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(format!(
                "Cannot find algorithm results for {}",
                path.display()
            ))
        } else {
            Error::Io(e)
        }
    })?;

    match ingest_lines(db, wiki, BufReader::new(file), insert_chunk).await {
        Ok(counts) => Ok(counts),
        Err(e) => {
            // No half-built partition may survive a failed file
            db.drop_partition(wiki).await?;
            Err(e)
        }
    }
}

async fn ingest_lines(
    db: &SuggestionDb,
    wiki: &str,
    reader: BufReader<File>,
    insert_chunk: usize,
) -> Result<RowCounts> {
    let mut lines = reader.lines();

    let header = lines
        .next_line()
        .await?
        .ok_or_else(|| Error::Validation("TSV file is empty".to_string()))?;
    validate_headers(&header)?;

    db.create_partition(wiki).await?;

    let mut counts = RowCounts::default();
    let mut pending: Option<PendingPage> = None;
    let mut batch = Batch::default();

    while let Some(line) = lines.next_line().await? {
        // Tolerate blank lines (usually a trailing newline)
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != EXPECTED_HEADERS.len() {
            return Err(Error::Validation("Invalid row to insert".to_string()));
        }

        let page_id: i64 = fields[0]
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid page id: {}", fields[0])))?;
        let image_id = fields[2];
        let has_image = !is_empty_value(image_id);

        if has_image {
            batch.images.push(ImageRow {
                id: image_id.to_string(),
                confidence_rating: fields[3].to_string(),
                source: fields[4].to_string(),
                dataset_id: fields[5].to_string(),
                insertion_ts: fields[6].parse().unwrap_or(0.0),
                // The wiki column is implied by the table name and not stored
                found_on: fields[8].to_string(),
            });
            batch.links.push(LinkRow {
                page_id,
                image_id: image_id.to_string(),
                image_source: fields[4].to_string(),
            });
        }

        match pending.as_mut() {
            Some(page) if page.id == page_id => {
                page.has_images |= has_image;
            }
            _ => {
                if let Some(done) = pending.take() {
                    batch.pages.push(number_page(done, &mut counts));
                }
                pending = Some(PendingPage {
                    id: page_id,
                    title: fields[1].to_string(),
                    has_images: has_image,
                });
            }
        }

        batch.rows_seen += 1;
        if batch.rows_seen >= insert_chunk {
            batch.flush(db, wiki).await?;
        }
    }

    if let Some(done) = pending.take() {
        batch.pages.push(number_page(done, &mut counts));
    }
    batch.flush(db, wiki).await?;

    Ok(counts)
}

/// Assign the next dense row number, and the next suggestion row number
/// when the page accumulated at least one image
fn number_page(page: PendingPage, counts: &mut RowCounts) -> PageRow {
    counts.max_row_num += 1;
    let row_num_ima = if page.has_images {
        counts.max_row_num_ima += 1;
        counts.max_row_num_ima
    } else {
        0
    };
    PageRow {
        row_num: counts.max_row_num,
        row_num_ima,
        id: page.id,
        title: page.title,
    }
}

/// Populate the store from every recognized TSV file in a directory.
///
/// A file failing validation (or going missing) aborts that partition
/// only; remaining partitions still load. The row-count index is
/// updated for each partition that completes.
pub async fn populate_database(
    db: &SuggestionDb,
    index: &mut RowCountIndex,
    tsv_dir: &Path,
    insert_chunk: usize,
) -> Result<()> {
    let mut partitions = Vec::new();
    for entry in std::fs::read_dir(tsv_dir)
        .map_err(|_| Error::NotFound(format!("Cannot read TSV directory {}", tsv_dir.display())))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(wiki) = wiki::partition_from_filename(&name) {
            partitions.push((wiki, entry.path()));
        }
    }
    if partitions.is_empty() {
        return Err(Error::NotFound(
            "No tsv files found to populate database with".to_string(),
        ));
    }
    partitions.sort();

    for (wiki, path) in partitions {
        info!("Starting {}", path.display());
        match ingest_file(db, &wiki, &path, insert_chunk).await {
            Ok(counts) => {
                index.set(&wiki, counts);
                info!(
                    "Done inserting {} ({} pages, {} with suggestions)",
                    wiki, counts.max_row_num, counts.max_row_num_ima
                );
            }
            Err(e @ (Error::Validation(_) | Error::NotFound(_))) => {
                warn!("Skipping {}: {}", wiki, e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
