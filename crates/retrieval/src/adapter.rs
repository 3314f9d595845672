//! Per-domain search adapters.

use crate::store::{DocumentStore, KeywordQuery};
use std::sync::Arc;
use unilink_core::domain::MAX_EVIDENCE_LIMIT;
use unilink_core::{AppResult, Domain, EvidenceItem};

/// Pages fetched per search while skipping undecodable documents.
const MAX_SEARCH_PAGES: usize = 4;

/// Where a searchable domain lives and which fields its keywords hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainProfile {
    pub domain: Domain,
    pub collection: &'static str,
    pub fields: &'static [&'static str],
}

impl DomainProfile {
    /// Profile for a domain, `None` for General.
    pub fn for_domain(domain: Domain) -> Option<Self> {
        let fields: &'static [&'static str] = match domain {
            Domain::ItemTracking => &["itemName", "description"],
            Domain::BloodDonation => &["bloodGroup", "location"],
            Domain::RideSharing => &["startLocation", "endLocation"],
            Domain::VehicleRental => &["vehicleType", "title", "specs"],
            Domain::General => return None,
        };

        Some(Self {
            domain,
            collection: domain.collection(),
            fields,
        })
    }
}

/// Keyword search over one domain's collection.
///
/// All four searchable domains share this implementation; only the
/// [`DomainProfile`] differs.
#[derive(Clone)]
pub struct SearchAdapter {
    profile: DomainProfile,
    store: Arc<dyn DocumentStore>,
}

impl SearchAdapter {
    pub fn new(profile: DomainProfile, store: Arc<dyn DocumentStore>) -> Self {
        Self { profile, store }
    }

    /// Adapter for `domain`, `None` for General.
    pub fn for_domain(domain: Domain, store: Arc<dyn DocumentStore>) -> Option<Self> {
        DomainProfile::for_domain(domain).map(|profile| Self::new(profile, store))
    }

    pub fn profile(&self) -> &DomainProfile {
        &self.profile
    }

    /// Find up to `limit` records matching any keyword in any searchable field.
    ///
    /// Stored documents that do not decode into the domain's record type are
    /// skipped and do not count towards `limit`: further pages are fetched,
    /// up to `MAX_SEARCH_PAGES`, until `limit` records decode.
    pub async fn search(&self, keywords: &[String], limit: usize) -> AppResult<Vec<EvidenceItem>> {
        let limit = limit.min(MAX_EVIDENCE_LIMIT);
        let query = KeywordQuery::new(keywords, self.profile.fields.iter(), limit);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(limit);
        let mut offset = 0;
        for _ in 0..MAX_SEARCH_PAGES {
            let page = query.clone().with_offset(offset);
            let documents = self.store.search(self.profile.collection, &page).await?;
            let fetched = documents.len();

            for document in documents {
                match EvidenceItem::decode(self.profile.domain, document) {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::warn!(
                        "Skipping undecodable {} document: {}",
                        self.profile.collection,
                        e
                    ),
                }
            }

            if items.len() >= limit || fetched < limit {
                break;
            }
            offset += fetched;
        }
        items.truncate(limit);

        tracing::debug!(
            "{} search for {:?} returned {} record(s)",
            self.profile.collection,
            query.terms(),
            items.len()
        );
        Ok(items)
    }
}
