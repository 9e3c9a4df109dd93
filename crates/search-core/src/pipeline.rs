use std::sync::Arc;

use anyhow::Result;
use common::{
    MedicineHit, MedicineRecord, SearchFilters, SearchRequest, SearchResponse, config::SpaceConfig, query_fingerprint,
};
use embeddings::QueryEncoder;
use rayon::prelude::*;

use crate::{
    classifier::{QueryKind, batch_id_matches, classify},
    filter,
    fusion::{self, Candidate, SourceKind},
    lexical::LexicalMatcher,
    retrieval::RetrievalDefaults,
    snapshot::{CatalogHandle, CatalogSnapshot},
    vector::VectorRetriever,
};

pub const MAX_QUERY_CHARS: usize = 1_024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("no query or filters provided")]
    EmptyQuery,
    #[error("query exceeds {max} characters")]
    QueryTooLong { max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRoute {
    FastPath,
    Hybrid,
    Browse,
}

impl SearchRoute {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FastPath => "fast_path",
            Self::Hybrid => "hybrid",
            Self::Browse => "browse",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub response: SearchResponse,
    pub route: SearchRoute,
    /// Embedding spaces that failed for this query and contributed nothing.
    pub degraded_spaces: Vec<String>,
}

/// Runs the full query path against whatever snapshot the handle holds.
pub struct HybridSearcher {
    handle: CatalogHandle,
    lexical: LexicalMatcher,
    retrievers: Vec<VectorRetriever>,
    defaults: RetrievalDefaults,
}

impl HybridSearcher {
    pub fn new(
        handle: CatalogHandle,
        encoder: Arc<dyn QueryEncoder>,
        spaces: &[SpaceConfig],
        defaults: RetrievalDefaults,
    ) -> Self {
        let retrievers = spaces
            .iter()
            .enumerate()
            .map(|(ordinal, space)| VectorRetriever::new(space.name.clone(), ordinal, space.k, Arc::clone(&encoder)))
            .collect();
        Self {
            handle,
            lexical: LexicalMatcher::new(defaults.searchable_fields.clone(), defaults.fuzzy_threshold),
            retrievers,
            defaults,
        }
    }

    pub const fn handle(&self) -> &CatalogHandle {
        &self.handle
    }

    pub const fn defaults(&self) -> &RetrievalDefaults {
        &self.defaults
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let query = request.query.trim();
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(SearchError::QueryTooLong { max: MAX_QUERY_CHARS });
        }
        let filters = request.filters.clone().normalized();
        let top_k = self.defaults.top_k(request.top_k);
        let snapshot = self.handle.current();

        let outcome = match classify(query) {
            QueryKind::Empty if filters.is_empty() => return Err(SearchError::EmptyQuery),
            QueryKind::Empty => browse(&snapshot, &filters, top_k),
            QueryKind::BatchId => {
                let positions = batch_id_matches(snapshot.records(), query);
                if positions.is_empty() {
                    self.hybrid(&snapshot, query, &filters, top_k)
                } else {
                    let candidates = positions
                        .into_iter()
                        .map(|position| Candidate {
                            position,
                            source: SourceKind::FastPath,
                            raw_score: 0.0,
                        })
                        .collect();
                    SearchOutcome {
                        response: SearchResponse::from_hits(fuse_and_filter(&snapshot, candidates, &filters, top_k)),
                        route: SearchRoute::FastPath,
                        degraded_spaces: Vec::new(),
                    }
                }
            }
            QueryKind::FreeText => self.hybrid(&snapshot, query, &filters, top_k),
        };

        tracing::debug!(
            query_hash = %query_fingerprint(query),
            route = outcome.route.as_str(),
            results = outcome.response.total,
            degraded = outcome.degraded_spaces.len(),
            "search_complete"
        );
        Ok(outcome)
    }

    fn hybrid(&self, snapshot: &CatalogSnapshot, query: &str, filters: &SearchFilters, top_k: usize) -> SearchOutcome {
        let threshold = self.defaults.vector_threshold;
        let (mut candidates, per_space) = rayon::join(
            || self.lexical.candidates(query, snapshot.records()),
            || {
                self.retrievers
                    .par_iter()
                    .zip(snapshot.spaces())
                    .map(|(retriever, space)| (retriever.name(), retriever.candidates(&space.index, query, threshold)))
                    .collect::<Vec<_>>()
            },
        );

        let mut degraded_spaces = Vec::new();
        for (space, result) in per_space {
            match result {
                Ok(found) => candidates.extend(found),
                Err(err) => {
                    tracing::warn!(space, error = %err, "embedding space lookup failed; continuing without it");
                    degraded_spaces.push(space.to_string());
                }
            }
        }

        SearchOutcome {
            response: SearchResponse::from_hits(fuse_and_filter(snapshot, candidates, filters, top_k)),
            route: SearchRoute::Hybrid,
            degraded_spaces,
        }
    }

    /// Nearest catalog records in the first embedding space, without any
    /// distance cut-off.
    pub fn nearest(&self, query: &str, k: usize) -> Result<Vec<MedicineRecord>> {
        let snapshot = self.handle.current();
        let (Some(retriever), Some(space)) = (self.retrievers.first(), snapshot.spaces().first()) else {
            return Ok(Vec::new());
        };
        if space.index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = retriever.encode(query)?;
        Ok(space
            .index
            .search(&vector, k)?
            .into_iter()
            .map(|n| snapshot.records()[n.position].clone())
            .collect())
    }
}

fn fuse_and_filter(
    snapshot: &CatalogSnapshot,
    candidates: Vec<Candidate>,
    filters: &SearchFilters,
    top_k: usize,
) -> Vec<MedicineHit> {
    match fusion::fuse(
        snapshot.records(),
        candidates,
        filters.form.as_deref(),
        filters.category.as_deref(),
        top_k,
    ) {
        Ok(hits) => filter::apply_filters(hits, filters),
        Err(err) => {
            tracing::error!(error = %err, "result fusion failed; returning no results");
            Vec::new()
        }
    }
}

/// Filter-only request: matching records in catalog order.
fn browse(snapshot: &CatalogSnapshot, filters: &SearchFilters, top_k: usize) -> SearchOutcome {
    let hits = snapshot
        .records()
        .iter()
        .filter(|record| filter::matches(record, filters))
        .take(top_k)
        .map(|record| MedicineHit {
            record: record.clone(),
            relevance_score: 0.0,
        })
        .collect();
    SearchOutcome {
        response: SearchResponse::from_hits(hits),
        route: SearchRoute::Browse,
        degraded_spaces: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use anyhow::{Result, anyhow};
    use common::{MedicineRecord, SearchFilters, SearchRequest, config::SpaceConfig, snapshot::SnapshotRow};
    use embeddings::QueryEncoder;

    use super::{HybridSearcher, MAX_QUERY_CHARS, SearchError, SearchRoute};
    use crate::{
        retrieval::RetrievalDefaults,
        snapshot::{CatalogHandle, CatalogSnapshot},
    };

    struct Origin;

    impl QueryEncoder for Origin {
        fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0, 0.0])
        }
    }

    struct Offline;

    impl QueryEncoder for Offline {
        fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Err(anyhow!("model not loaded"))
        }
    }

    fn spaces() -> Vec<SpaceConfig> {
        vec![
            SpaceConfig {
                name: "disease_symptom".to_string(),
                column: "embedding_filter_2".to_string(),
                k: 5,
            },
            SpaceConfig {
                name: "form_category".to_string(),
                column: "embedding_filter_3".to_string(),
                k: 10,
            },
        ]
    }

    fn row(batch_id: &str, name: &str, form: &str, a: [f32; 2], b: [f32; 2]) -> SnapshotRow {
        SnapshotRow {
            record: MedicineRecord {
                batch_id: batch_id.to_string(),
                name: name.to_string(),
                form: form.to_string(),
                price: 10.0,
                total_quantity: 5,
                ..MedicineRecord::default()
            },
            vectors: BTreeMap::from([
                ("embedding_filter_2".to_string(), a.to_vec()),
                ("embedding_filter_3".to_string(), b.to_vec()),
            ]),
        }
    }

    fn searcher(encoder: Arc<dyn QueryEncoder>) -> HybridSearcher {
        let snapshot = CatalogSnapshot::build(
            vec![
                row("BATCH_1", "Paracetamol", "Tablet", [0.0, 0.0], [5.0, 5.0]),
                row("BATCH_2", "Ibuprofen", "Tablet", [0.2, 0.0], [0.3, 0.0]),
                row("BATCH_3", "Benadryl", "Syrup", [4.0, 4.0], [0.1, 0.0]),
            ],
            &spaces(),
        )
        .expect("snapshot");
        HybridSearcher::new(CatalogHandle::new(snapshot), encoder, &spaces(), RetrievalDefaults::default())
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            ..SearchRequest::default()
        }
    }

    fn ids(outcome: &super::SearchOutcome) -> Vec<&str> {
        outcome
            .response
            .results
            .iter()
            .map(|h| h.record.batch_id.as_str())
            .collect()
    }

    #[test]
    fn empty_query_without_filters_is_rejected() {
        let s = searcher(Arc::new(Origin));
        assert_eq!(s.search(&request("   ")), Err(SearchError::EmptyQuery));
    }

    #[test]
    fn overlong_query_is_rejected() {
        let s = searcher(Arc::new(Origin));
        let long = "a".repeat(MAX_QUERY_CHARS + 1);
        assert_eq!(s.search(&request(&long)), Err(SearchError::QueryTooLong { max: MAX_QUERY_CHARS }));
    }

    #[test]
    fn filter_only_request_browses_in_catalog_order() {
        let s = searcher(Arc::new(Origin));
        let outcome = s
            .search(&SearchRequest {
                filters: SearchFilters {
                    form: Some("Tablet".to_string()),
                    ..SearchFilters::default()
                },
                ..SearchRequest::default()
            })
            .expect("browse");
        assert_eq!(outcome.route, SearchRoute::Browse);
        assert_eq!(ids(&outcome), vec!["BATCH_1", "BATCH_2"]);
        assert!(outcome.response.results.iter().all(|h| h.relevance_score == 0.0));
    }

    #[test]
    fn hybrid_merges_lexical_and_both_spaces() {
        let s = searcher(Arc::new(Origin));
        let outcome = s.search(&request("paracetamol")).expect("search");
        assert_eq!(outcome.route, SearchRoute::Hybrid);
        assert!(outcome.degraded_spaces.is_empty());
        // BATCH_1 lexical; BATCH_2 from the first space (0.04); BATCH_3 from
        // the second space (0.01). Max surviving distance is 0.04.
        assert_eq!(ids(&outcome), vec!["BATCH_1", "BATCH_2", "BATCH_3"]);
        let scores = outcome
            .response
            .results
            .iter()
            .map(|h| h.relevance_score)
            .collect::<Vec<_>>();
        assert!((scores[0] - 2.0).abs() < 1e-9);
        assert!(scores[1].abs() < 1e-6);
        assert!((scores[2] - 0.75).abs() < 1e-6);
        assert_eq!(outcome.response.total, 3);
    }

    #[test]
    fn failing_encoder_degrades_to_lexical_only() {
        let s = searcher(Arc::new(Offline));
        let outcome = s.search(&request("paracetamol")).expect("search");
        assert_eq!(ids(&outcome), vec!["BATCH_1"]);
        assert_eq!(outcome.degraded_spaces, vec!["disease_symptom", "form_category"]);
    }

    #[test]
    fn top_k_zero_returns_single_best_hit() {
        let s = searcher(Arc::new(Origin));
        let outcome = s
            .search(&SearchRequest {
                top_k: Some(0),
                ..request("paracetamol")
            })
            .expect("search");
        assert_eq!(ids(&outcome), vec!["BATCH_1"]);
    }

    #[test]
    fn identifier_query_takes_fast_path() {
        let s = searcher(Arc::new(Offline));
        let outcome = s.search(&request("batch_2")).expect("search");
        assert_eq!(outcome.route, SearchRoute::FastPath);
        assert_eq!(ids(&outcome), vec!["BATCH_2"]);
        assert!((outcome.response.results[0].relevance_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_ignores_distance_threshold() {
        let s = searcher(Arc::new(Origin));
        let names = s
            .nearest("fever", 7)
            .expect("nearest")
            .into_iter()
            .map(|r| r.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Paracetamol", "Ibuprofen", "Benadryl"]);
        assert!(searcher(Arc::new(Offline)).nearest("fever", 7).is_err());
    }
}
