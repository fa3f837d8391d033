//! Partition identifiers: wiki property + language pairs
//!
//! A partition id (e.g. `enwiki`) names the set of tables holding one
//! wiki's algorithm results. Ids come from two places: caller path
//! parameters resolved through [`resolve`], and TSV file names parsed
//! through [`partition_from_filename`]. Nothing else may construct one,
//! which keeps user input out of table names.

/// Languages with algorithm result datasets
const RECOGNIZED_LANGUAGES: &[&str] = &[
    "ar", "arz", "bn", "ceb", "cs", "de", "en", "eu", "fa", "fr", "he", "hu", "hy", "ko", "pl",
    "pt", "ru", "srw", "sv", "tr", "uk", "vi",
];

/// Map a wiki property name to its partition suffix
fn property_suffix(property: &str) -> Option<&'static str> {
    match property {
        "wikipedia" => Some("wiki"),
        _ => None,
    }
}

/// Convert a property/language pair (ex. "wikipedia" and "en") to a
/// partition id (ex. "enwiki"). Returns None for unknown pairs.
pub fn resolve(property: &str, lang: &str) -> Option<String> {
    let suffix = property_suffix(property)?;
    if RECOGNIZED_LANGUAGES.contains(&lang) {
        Some(format!("{}{}", lang, suffix))
    } else {
        None
    }
}

/// Derive a partition id from a TSV file name (ex. "enwiki.tsv").
/// Returns None when the name does not look like a recognized partition.
pub fn partition_from_filename(filename: &str) -> Option<String> {
    let stem = filename.strip_suffix(".tsv")?;
    let lang = stem.strip_suffix("wiki")?;
    if RECOGNIZED_LANGUAGES.contains(&lang) {
        Some(stem.to_string())
    } else {
        None
    }
}
