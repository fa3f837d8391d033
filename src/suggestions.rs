//! Request orchestration: validation, sampling, query, merge
//!
//! A caller request flows through parameter validation, row-number
//! resolution (explicit ids, seeded sampling, or natural order), the
//! store's query layer, and finally the merge with the external
//! provider under the per-page quota.

use crate::config::{Config, QueryConfig};
use crate::error::{Error, Result};
use crate::mediasearch::MediaSearchProvider;
use crate::models::{PagesResponse, QueryMode, Source};
use crate::rowcount::RowCountIndex;
use crate::sampler;
use crate::store::SuggestionDb;
use crate::wiki;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Caller-facing query parameters
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    /// Explicit page ids; mutually exclusive with seed, limit and offset
    pub ids: Option<Vec<i64>>,
    /// Number of pages to return, bounded by the configured maximum
    pub limit: Option<usize>,
    /// Pages (or sampler draws) to skip
    pub offset: Option<usize>,
    /// Seed for reproducible "random" ordering; 0 means natural order
    pub seed: Option<u64>,
    /// Restrict suggestions to one source; unset means all sources
    pub source: Option<Source>,
    /// Debug flag: keep pages that end up with zero suggestions
    pub no_filter: bool,
}

/// Assembles suggestion responses from the store, the row-count index
/// and the external provider
pub struct SuggestionService {
    db: SuggestionDb,
    index: RowCountIndex,
    provider: Arc<dyn MediaSearchProvider>,
    limits: QueryConfig,
    provider_timeout: Duration,
}

impl SuggestionService {
    pub fn new(
        db: SuggestionDb,
        index: RowCountIndex,
        provider: Arc<dyn MediaSearchProvider>,
        config: &Config,
    ) -> Self {
        Self {
            db,
            index,
            provider,
            limits: config.query.clone(),
            provider_timeout: Duration::from_secs(config.media_search.timeout_secs),
        }
    }

    /// Serve one pages request for a wiki property/language pair
    pub async fn get_pages(
        &self,
        property: &str,
        lang: &str,
        query: &PageQuery,
    ) -> Result<PagesResponse> {
        let wiki = wiki::resolve(property, lang).ok_or_else(|| {
            Error::NotFound(format!(
                "Unable to find a wikiId for language {} and property {}",
                lang, property
            ))
        })?;

        let (mut limit, offset, seed) = self.validate(query)?;
        let mode = QueryMode::from_filter(query.source);

        let row_nums = match &query.ids {
            Some(ids) => {
                let nums = self.db.fetch_row_nums(&wiki, mode, ids).await?;
                // Explicit ids bypass pagination entirely
                limit = nums.len();
                Some(nums)
            }
            None if seed > 0 => {
                let population = self.index.get(&wiki, mode);
                if population == 0 {
                    // Nothing ingested for this mode; sampling would
                    // only produce row numbers that match no page
                    return Ok(PagesResponse { seed, pages: Vec::new() });
                }
                Some(sampler::sample(seed, limit, offset, population))
            }
            None => None,
        };
        debug!(
            "pages request for {}: mode {:?}, limit {}, offset {}, seed {}",
            wiki, mode, limit, offset, seed
        );

        let mut pages = self
            .db
            .fetch_pages(&wiki, mode, limit, offset, row_nums.as_deref())
            .await?;

        // Pages were fetched with their algorithm suggestions attached;
        // a provider-only filter discards those before the merge.
        if query.source == Some(Source::Ms) {
            for page in &mut pages {
                page.suggestions.clear();
            }
        }

        let wants_provider = matches!(query.source, None | Some(Source::Ms));
        if wants_provider && !pages.is_empty() {
            let quota = self.limits.max_suggestions_per_page;
            let lookups = pages.iter().map(|page| {
                let remaining = quota.saturating_sub(page.suggestions.len());
                let title = page.page.clone();
                let provider = Arc::clone(&self.provider);
                async move {
                    if remaining == 0 {
                        Ok(Vec::new())
                    } else {
                        provider.search(&title, remaining).await
                    }
                }
            });

            // One failing lookup fails the whole response: a silently
            // incomplete page is indistinguishable from one with no
            // provider results. The timeout keeps a stalled upstream
            // from holding the response open indefinitely.
            let results = timeout(self.provider_timeout, try_join_all(lookups))
                .await
                .map_err(|_| Error::Upstream("media search request timed out".to_string()))??;

            // try_join_all preserves input order, pairing 1:1 with pages
            for (page, extra) in pages.iter_mut().zip(results) {
                page.suggestions.extend(extra);
            }
        }

        if !query.no_filter {
            pages.retain(|page| !page.suggestions.is_empty());
        }

        Ok(PagesResponse { seed, pages })
    }

    /// Resolve limit/offset/seed defaults and reject bad combinations
    fn validate(&self, query: &PageQuery) -> Result<(usize, usize, u64)> {
        if query.ids.is_some()
            && (query.seed.is_some() || query.limit.is_some() || query.offset.is_some())
        {
            return Err(Error::Validation(
                "Page ids cannot be combined with seed, limit or offset".to_string(),
            ));
        }
        if let Some(ids) = &query.ids {
            if ids.is_empty() {
                return Err(Error::Validation("Page id list must not be empty".to_string()));
            }
        }

        let limit = query.limit.unwrap_or(self.limits.default_limit);
        if limit > self.limits.max_limit {
            return Err(Error::Validation(format!(
                "Limit must be a number less than {}",
                self.limits.max_limit
            )));
        }

        Ok((limit, query.offset.unwrap_or(0), query.seed.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceDetails, SourceInfo, Suggestion};
    use crate::store::{ImageRow, LinkRow, PageRow};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Provider stub: fixed filenames per title, call recording, and an
    /// optional failure switch
    #[derive(Default)]
    struct StubProvider {
        results: Vec<(String, Vec<String>)>,
        fail: bool,
        calls: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl MediaSearchProvider for StubProvider {
        async fn search(&self, page_title: &str, limit: usize) -> Result<Vec<Suggestion>> {
            self.calls.lock().unwrap().push((page_title.to_string(), limit));
            if self.fail {
                return Err(Error::Upstream("stub failure".to_string()));
            }
            Ok(self
                .results
                .iter()
                .find(|(title, _)| title == page_title)
                .map(|(_, files)| files.clone())
                .unwrap_or_default()
                .into_iter()
                .take(limit)
                .map(|filename| Suggestion {
                    filename,
                    confidence_rating: "low".to_string(),
                    source: SourceInfo {
                        name: Source::Ms,
                        details: SourceDetails::default(),
                    },
                })
                .collect())
        }
    }

    async fn seeded_db(tmp: &TempDir) -> SuggestionDb {
        let db = SuggestionDb::new(&tmp.path().join("test.db")).await.unwrap();
        db.create_partition("arwiki").await.unwrap();
        db.insert_pages(
            "arwiki",
            &[
                PageRow { row_num: 1, row_num_ima: 1, id: 10, title: "Frog".into() },
                PageRow { row_num: 2, row_num_ima: 0, id: 20, title: "Stone".into() },
                PageRow { row_num: 3, row_num_ima: 2, id: 30, title: "Pond".into() },
            ],
        )
        .await
        .unwrap();
        db.insert_images(
            "arwiki",
            &[
                ImageRow {
                    id: "Frog.jpg".into(),
                    confidence_rating: "medium".into(),
                    source: "wikipedia".into(),
                    dataset_id: "d1".into(),
                    insertion_ts: 1.0,
                    found_on: "dewiki".into(),
                },
                ImageRow {
                    id: "Pond.jpg".into(),
                    confidence_rating: "high".into(),
                    source: "wikidata".into(),
                    dataset_id: "d1".into(),
                    insertion_ts: 1.0,
                    found_on: String::new(),
                },
            ],
        )
        .await
        .unwrap();
        db.insert_links(
            "arwiki",
            &[
                LinkRow { page_id: 10, image_id: "Frog.jpg".into(), image_source: "wikipedia".into() },
                LinkRow { page_id: 30, image_id: "Pond.jpg".into(), image_source: "wikidata".into() },
            ],
        )
        .await
        .unwrap();
        db
    }

    async fn service_with(provider: StubProvider, tmp: &TempDir) -> SuggestionService {
        let db = seeded_db(tmp).await;
        let index = RowCountIndex::scan(&db).await.unwrap();
        SuggestionService::new(db, index, Arc::new(provider), &Config::default())
    }

    #[tokio::test]
    async fn test_unknown_wiki_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;
        let err = service
            .get_pages("wikipedia", "aar", &PageQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_ids_exclusive_with_seed_limit_offset() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;
        for query in [
            PageQuery { ids: Some(vec![10]), seed: Some(1), ..Default::default() },
            PageQuery { ids: Some(vec![10]), limit: Some(5), ..Default::default() },
            PageQuery { ids: Some(vec![10]), offset: Some(1), ..Default::default() },
        ] {
            let err = service
                .get_pages("wikipedia", "ar", &query)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{:?}", query);
        }
    }

    #[tokio::test]
    async fn test_limit_above_maximum_rejected() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;
        let err = service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery { limit: Some(101), ..Default::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_ima_filter_never_calls_provider() {
        let tmp = TempDir::new().unwrap();
        // A provider call would fail the request, proving isolation
        let service = service_with(
            StubProvider { fail: true, ..Default::default() },
            &tmp,
        )
        .await;

        let response = service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery { source: Some(Source::Ima), ..Default::default() },
            )
            .await
            .unwrap();

        // Only pages with algorithm suggestions, all of them internal
        assert_eq!(response.pages.len(), 2);
        assert!(response
            .pages
            .iter()
            .all(|p| p.suggestions.iter().all(|s| s.source.name == Source::Ima)));
    }

    #[tokio::test]
    async fn test_merge_appends_provider_after_internal() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(
            StubProvider {
                results: vec![
                    ("Frog".to_string(), vec!["Extra.png".to_string()]),
                    ("Stone".to_string(), vec!["Rock.png".to_string()]),
                ],
                ..Default::default()
            },
            &tmp,
        )
        .await;

        let response = service
            .get_pages("wikipedia", "ar", &PageQuery::default())
            .await
            .unwrap();

        assert_eq!(response.pages.len(), 3);
        let frog = &response.pages[0];
        assert_eq!(frog.page, "Frog");
        assert_eq!(frog.suggestions.len(), 2);
        assert_eq!(frog.suggestions[0].source.name, Source::Ima);
        assert_eq!(frog.suggestions[1].filename, "Extra.png");
        assert_eq!(frog.suggestions[1].source.name, Source::Ms);

        // Stone has no internal suggestions but gains one from the provider
        let stone = &response.pages[1];
        assert_eq!(stone.suggestions.len(), 1);
        assert_eq!(stone.suggestions[0].filename, "Rock.png");
    }

    #[tokio::test]
    async fn test_provider_asked_for_remaining_quota_only() {
        let tmp = TempDir::new().unwrap();
        let db = seeded_db(&tmp).await;
        let index = RowCountIndex::scan(&db).await.unwrap();
        let provider = Arc::new(StubProvider::default());
        let service =
            SuggestionService::new(db, index, provider.clone(), &Config::default());

        service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery { no_filter: true, ..Default::default() },
            )
            .await
            .unwrap();

        // Quota is 10; Frog and Pond already hold one internal each
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.contains(&("Frog".to_string(), 9)));
        assert!(calls.contains(&("Stone".to_string(), 10)));
        assert!(calls.contains(&("Pond".to_string(), 9)));
    }

    #[tokio::test]
    async fn test_ms_filter_strips_internal_suggestions() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(
            StubProvider {
                results: vec![("Frog".to_string(), vec!["Extra.png".to_string()])],
                ..Default::default()
            },
            &tmp,
        )
        .await;

        let response = service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery { source: Some(Source::Ms), ..Default::default() },
            )
            .await
            .unwrap();

        // Only Frog has provider results; everything else filtered out
        assert_eq!(response.pages.len(), 1);
        assert_eq!(response.pages[0].page, "Frog");
        assert!(response.pages[0]
            .suggestions
            .iter()
            .all(|s| s.source.name == Source::Ms));
    }

    #[tokio::test]
    async fn test_zero_suggestion_pages_dropped_unless_debug() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;

        let filtered = service
            .get_pages("wikipedia", "ar", &PageQuery::default())
            .await
            .unwrap();
        assert!(filtered.pages.iter().all(|p| !p.suggestions.is_empty()));
        assert_eq!(filtered.pages.len(), 2);

        let tmp2 = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp2).await;
        let unfiltered = service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery { no_filter: true, ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(unfiltered.pages.len(), 3);
        assert!(unfiltered.pages[1].suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_fails_whole_response() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(
            StubProvider { fail: true, ..Default::default() },
            &tmp,
        )
        .await;

        let err = service
            .get_pages("wikipedia", "ar", &PageQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_seeded_requests_are_reproducible() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;

        let query = PageQuery {
            limit: Some(2),
            offset: Some(3),
            seed: Some(7),
            source: Some(Source::Ima),
            ..Default::default()
        };
        let first = service.get_pages("wikipedia", "ar", &query).await.unwrap();
        let second = service.get_pages("wikipedia", "ar", &query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.seed, 7);
    }

    #[tokio::test]
    async fn test_seed_zero_uses_natural_order() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;

        let response = service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery {
                    seed: Some(0),
                    limit: Some(1),
                    source: Some(Source::Ima),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.seed, 0);
        assert_eq!(response.pages.len(), 1);
        assert_eq!(response.pages[0].page_id, 10);
    }

    #[tokio::test]
    async fn test_explicit_ids() {
        let tmp = TempDir::new().unwrap();
        let service = service_with(StubProvider::default(), &tmp).await;

        let response = service
            .get_pages(
                "wikipedia",
                "ar",
                &PageQuery {
                    ids: Some(vec![30, 10]),
                    source: Some(Source::Ima),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<i64> = response.pages.iter().map(|p| p.page_id).collect();
        assert_eq!(ids, vec![10, 30]);
    }
}
