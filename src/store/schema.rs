//! Per-partition SQLite schema
//!
//! Every partition (e.g. `enwiki`) owns three tables. `row_num` is the
//! primary key of the page table because seeded sampling selects by it
//! constantly; we do not rely on autoincrement or sqlite rowids since
//! those are not guaranteed gap-free, and the sampler needs a dense
//! 1..N range.

/// Statements that drop and recreate one partition's tables.
/// Re-ingestion is a wholesale rebuild, never an incremental upsert of
/// the row-numbering scheme.
pub fn create_partition_sql(wiki: &str) -> String {
    format!(
        r#"
DROP TABLE IF EXISTS {wiki}_page;
DROP TABLE IF EXISTS {wiki}_image;
DROP TABLE IF EXISTS {wiki}_image_page;

-- Pages: one row per article, dense row numbering assigned at ingestion
CREATE TABLE {wiki}_page(
    row_num INTEGER NOT NULL PRIMARY KEY,
    row_num_ima INTEGER NOT NULL,
    id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL
);

-- Images: one row per (filename, source) pair
CREATE TABLE {wiki}_image(
    id TEXT,
    confidence_rating TEXT,
    source TEXT,
    dataset_id TEXT,
    insertion_ts REAL,
    found_on TEXT,
    PRIMARY KEY (id, source)
);

-- Join table: which image-from-which-source is suggested for which page
CREATE TABLE {wiki}_image_page(
    page_id INTEGER NOT NULL,
    image_id TEXT NOT NULL,
    image_source TEXT NOT NULL,
    PRIMARY KEY (page_id, image_id, image_source)
);

CREATE INDEX {wiki}_row_num_ima ON {wiki}_page ( row_num_ima );
"#
    )
}
