//! Suggestion store and deterministic sampling engine for
//! under-illustrated wiki pages
//!
//! Algorithm results arrive as one TSV file per partition, are bulk
//! loaded into per-partition SQLite tables, and are then served
//! read-only: sequential or seeded-reproducible page sampling, merged
//! with on-demand external media-search results under a per-page quota.

pub mod config;
pub mod error;
pub mod ingest;
pub mod mediasearch;
pub mod models;
pub mod rowcount;
pub mod sampler;
pub mod store;
pub mod suggestions;
pub mod wiki;
