//! Retrieval orchestration.

use crate::adapter::SearchAdapter;
use crate::store::DocumentStore;
use std::sync::Arc;
use unilink_core::domain::{DEFAULT_EVIDENCE_LIMIT, MAX_EVIDENCE_LIMIT};
use unilink_core::{ClassificationResult, Domain, EvidenceSet};

/// Turns a classification into a bounded evidence set.
///
/// Retrieval is advisory: a failing store yields an empty set for the
/// classified domain and the request carries on.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn DocumentStore>,
    limit: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            limit: DEFAULT_EVIDENCE_LIMIT,
        }
    }

    /// Set the per-request item limit (clamped to 1..=20).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_EVIDENCE_LIMIT);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn retrieve(&self, classification: &ClassificationResult) -> EvidenceSet {
        if !classification.wants_retrieval() {
            tracing::debug!("No retrieval for {} request", classification.domain);
            return EvidenceSet::empty(Domain::General);
        }

        let domain = classification.domain;
        let Some(adapter) = SearchAdapter::for_domain(domain, Arc::clone(&self.store)) else {
            return EvidenceSet::empty(Domain::General);
        };

        match adapter.search(&classification.keywords, self.limit).await {
            Ok(items) => {
                let evidence = EvidenceSet::new(domain, items, self.limit);
                tracing::info!(
                    domain = %domain,
                    collection = adapter.profile().collection,
                    items = evidence.len(),
                    backend = self.store.backend_name(),
                    "Retrieved evidence"
                );
                evidence
            }
            Err(e) => {
                tracing::warn!("{} search failed, continuing without evidence: {}", domain, e);
                EvidenceSet::empty(domain)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use crate::store::KeywordQuery;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use unilink_core::{AppError, AppResult};

    /// Records every search and answers from a fixed document list.
    #[derive(Default)]
    struct RecordingStore {
        documents: Vec<Value>,
        fail: bool,
        calls: Mutex<Vec<(String, KeywordQuery)>>,
    }

    #[async_trait::async_trait]
    impl DocumentStore for RecordingStore {
        fn backend_name(&self) -> &str {
            "recording"
        }

        async fn search(&self, collection: &str, query: &KeywordQuery) -> AppResult<Vec<Value>> {
            self.calls
                .lock()
                .unwrap()
                .push((collection.to_string(), query.clone()));
            if self.fail {
                return Err(AppError::Store("store unavailable".to_string()));
            }
            Ok(self.documents.clone())
        }

        async fn insert(&self, _collection: &str, _document: &Value) -> AppResult<()> {
            Ok(())
        }
    }

    fn ride(n: u32) -> Value {
        json!({
            "startLocation": "Campus",
            "endLocation": format!("Stop {}", n),
            "vehicleType": "Car",
            "costPerPerson": 50.0,
            "seatsAvailable": 3,
            "departureTime": "2026-03-01T08:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_general_skips_adapters() {
        let store = Arc::new(RecordingStore::default());
        let retriever = Retriever::new(store.clone());

        let evidence = retriever
            .retrieve(&ClassificationResult::from_keyword_str(Domain::General, "hello"))
            .await;

        assert_eq!(evidence.domain(), Domain::General);
        assert!(evidence.is_empty());
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_keywords_skip_adapters() {
        let store = Arc::new(RecordingStore::default());
        let retriever = Retriever::new(store.clone());

        let evidence = retriever
            .retrieve(&ClassificationResult::from_keyword_str(Domain::RideSharing, "  "))
            .await;

        assert_eq!(evidence.domain(), Domain::General);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_each_domain_queries_its_own_collection() {
        let table: [(Domain, &str, &[&str]); 4] = [
            (Domain::ItemTracking, "LostFound", &["itemName", "description"]),
            (Domain::BloodDonation, "BloodRequest", &["bloodGroup", "location"]),
            (Domain::RideSharing, "Ride", &["startLocation", "endLocation"]),
            (Domain::VehicleRental, "VehicleRental", &["vehicleType", "title", "specs"]),
        ];
        assert_eq!(table.len(), Domain::SEARCHABLE.len());

        for (domain, collection, fields) in table {
            assert!(Domain::SEARCHABLE.contains(&domain));
            let store = Arc::new(RecordingStore::default());
            let retriever = Retriever::new(store.clone());

            let evidence = retriever
                .retrieve(&ClassificationResult::from_keyword_str(domain, "campus"))
                .await;
            assert_eq!(evidence.domain(), domain);

            let calls = store.calls.lock().unwrap();
            assert_eq!(calls.len(), 1, "{} should hit exactly one adapter", domain);
            assert_eq!(calls[0].0, collection);
            assert_eq!(calls[0].1.fields(), fields);
            assert_eq!(calls[0].1.terms(), &["campus".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_exactly_one_adapter_and_limit() {
        let store = Arc::new(RecordingStore {
            documents: (0..12).map(ride).collect(),
            ..Default::default()
        });
        let retriever = Retriever::new(store.clone());

        let evidence = retriever
            .retrieve(&ClassificationResult::from_keyword_str(
                Domain::RideSharing,
                "campus downtown",
            ))
            .await;

        assert_eq!(evidence.domain(), Domain::RideSharing);
        assert_eq!(evidence.len(), DEFAULT_EVIDENCE_LIMIT);

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Ride");
        assert_eq!(calls[0].1.fields(), &["startLocation", "endLocation"]);
        assert_eq!(calls[0].1.limit(), DEFAULT_EVIDENCE_LIMIT);
    }

    #[tokio::test]
    async fn test_store_failure_yields_empty_domain_set() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let retriever = Retriever::new(store);

        let evidence = retriever
            .retrieve(&ClassificationResult::from_keyword_str(Domain::BloodDonation, "B+"))
            .await;

        assert_eq!(evidence.domain(), Domain::BloodDonation);
        assert!(evidence.is_empty());
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        assert_eq!(Retriever::new(store.clone()).with_limit(0).limit(), 1);
        assert_eq!(Retriever::new(store).with_limit(99).limit(), MAX_EVIDENCE_LIMIT);
    }

    #[tokio::test]
    async fn test_lost_item_found_in_sqlite() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .insert(
                "LostFound",
                &json!({
                    "itemType": "found",
                    "itemName": "Blue water bottle",
                    "description": "Steel, dented lid",
                    "location": "Library 2nd floor"
                }),
            )
            .await
            .unwrap();
        let retriever = Retriever::new(store);

        let evidence = retriever
            .retrieve(&ClassificationResult::from_keyword_str(
                Domain::ItemTracking,
                "blue bottle",
            ))
            .await;

        assert_eq!(evidence.domain(), Domain::ItemTracking);
        assert_eq!(evidence.len(), 1);
    }
}
