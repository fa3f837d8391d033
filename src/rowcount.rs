//! Per-partition row-count index
//!
//! The sampler needs to know each partition's population size. Data is
//! immutable once ingested, so the highest row numbers are computed
//! once (during ingestion, or by scanning a pre-existing store at
//! startup) and cached in an index object owned by the service rather
//! than in process-wide mutable state.

use crate::error::Result;
use crate::models::QueryMode;
use crate::store::SuggestionDb;
use std::collections::HashMap;
use tracing::debug;

/// Highest assigned row numbers for one partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    /// Highest `row_num`: total pages
    pub max_row_num: i64,
    /// Highest `row_num_ima`: pages with at least one suggestion
    pub max_row_num_ima: i64,
}

/// Read-only-after-startup map of partition name to row counts
#[derive(Debug, Clone, Default)]
pub struct RowCountIndex {
    counts: HashMap<String, RowCounts>,
}

impl RowCountIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record counts for a partition, typically at the end of its
    /// ingestion
    pub fn set(&mut self, wiki: &str, counts: RowCounts) {
        debug!(
            "row counts for {}: {} pages, {} with suggestions",
            wiki, counts.max_row_num, counts.max_row_num_ima
        );
        self.counts.insert(wiki.to_string(), counts);
    }

    /// Population size for a partition under the given query mode.
    /// Unknown partitions count as empty.
    pub fn get(&self, wiki: &str, mode: QueryMode) -> i64 {
        let counts = self.counts.get(wiki).copied().unwrap_or_default();
        match mode {
            QueryMode::ImaOnly => counts.max_row_num_ima,
            QueryMode::AllSources => counts.max_row_num,
        }
    }

    /// Build the index from an already-populated store by scanning the
    /// max row numbers of every partition
    pub async fn scan(db: &SuggestionDb) -> Result<Self> {
        let mut index = Self::new();
        for wiki in db.list_partitions().await? {
            let counts = db.max_row_counts(&wiki).await?;
            index.set(&wiki, counts);
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PageRow;
    use tempfile::TempDir;

    #[test]
    fn test_get_per_mode() {
        let mut index = RowCountIndex::new();
        index.set(
            "enwiki",
            RowCounts {
                max_row_num: 12,
                max_row_num_ima: 7,
            },
        );
        assert_eq!(index.get("enwiki", QueryMode::AllSources), 12);
        assert_eq!(index.get("enwiki", QueryMode::ImaOnly), 7);
        assert_eq!(index.get("dewiki", QueryMode::AllSources), 0);
    }

    #[tokio::test]
    async fn test_scan_existing_store() {
        let tmp = TempDir::new().unwrap();
        let db = SuggestionDb::new(&tmp.path().join("test.db")).await.unwrap();
        db.create_partition("arwiki").await.unwrap();
        db.insert_pages(
            "arwiki",
            &[
                PageRow { row_num: 1, row_num_ima: 1, id: 5, title: "A".into() },
                PageRow { row_num: 2, row_num_ima: 0, id: 6, title: "B".into() },
            ],
        )
        .await
        .unwrap();

        let index = RowCountIndex::scan(&db).await.unwrap();
        assert_eq!(index.get("arwiki", QueryMode::AllSources), 2);
        assert_eq!(index.get("arwiki", QueryMode::ImaOnly), 1);
    }
}
