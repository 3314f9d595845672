//! Loading sample records into a document store.
//!
//! A seed bundle is a JSON object keyed by collection name:
//!
//! ```json
//! { "LostFound": [ { "itemName": "...", ... } ], "Ride": [ ... ] }
//! ```

use crate::store::DocumentStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use unilink_core::{AppError, AppResult, Domain, EvidenceItem};

/// Documents grouped by collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedBundle {
    collections: BTreeMap<String, Vec<Value>>,
}

impl SeedBundle {
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let collections: BTreeMap<String, Vec<Value>> = serde_json::from_str(json)?;
        Ok(Self { collections })
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Inserted documents per collection
    pub inserted: BTreeMap<String, usize>,
    /// Documents that did not match their collection's record type
    pub rejected: usize,
}

impl SeedReport {
    pub fn total_inserted(&self) -> usize {
        self.inserted.values().sum()
    }
}

/// Insert every valid document of `bundle` into `store`.
///
/// Unknown collections fail the whole run before anything is written.
/// Individual documents that do not decode are rejected and counted.
pub async fn seed_store(store: &dyn DocumentStore, bundle: &SeedBundle) -> AppResult<SeedReport> {
    let mut targets = Vec::with_capacity(bundle.collections.len());
    for name in bundle.collections.keys() {
        let domain = Domain::SEARCHABLE
            .into_iter()
            .find(|d| d.collection() == name.as_str())
            .ok_or_else(|| AppError::Validation(format!("Unknown collection: {}", name)))?;
        targets.push((name, domain));
    }

    let mut report = SeedReport::default();
    for (name, domain) in targets {
        let mut inserted = 0;
        for document in &bundle.collections[name] {
            if let Err(e) = EvidenceItem::decode(domain, document.clone()) {
                tracing::warn!("Rejecting {} document: {}", name, e);
                report.rejected += 1;
                continue;
            }
            store.insert(name, document).await?;
            inserted += 1;
        }
        tracing::info!("Seeded {} {} document(s)", inserted, name);
        report.inserted.insert(name.clone(), inserted);
    }

    Ok(report)
}
