//! Request-scoped chat data model.
//!
//! Every value here lives for exactly one chat request and is handed by
//! value from one pipeline stage to the next.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::records::{BloodRequest, LostFoundItem, Ride, VehicleListing};

/// Hard upper bound on evidence items per request.
pub const MAX_EVIDENCE_LIMIT: usize = 20;

/// Evidence items retrieved per request unless configured otherwise.
pub const DEFAULT_EVIDENCE_LIMIT: usize = 5;

/// A validated, non-empty user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Validate raw caller input.
    ///
    /// Empty and whitespace-only input is rejected with the message shown to
    /// HTTP callers.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation("Question is required.".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The data categories a question can be routed to.
///
/// Serialized names are the collection names the classifier is instructed
/// to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "LostFound")]
    ItemTracking,
    #[serde(rename = "BloodRequest")]
    BloodDonation,
    #[serde(rename = "Ride")]
    RideSharing,
    #[serde(rename = "VehicleRental")]
    VehicleRental,
    #[serde(rename = "General")]
    General,
}

impl Domain {
    /// All searchable domains (everything except General).
    pub const SEARCHABLE: [Domain; 4] = [
        Domain::ItemTracking,
        Domain::BloodDonation,
        Domain::RideSharing,
        Domain::VehicleRental,
    ];

    /// Parse a collection name as emitted by the classifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lostfound" | "lost_found" | "itemtracking" => Some(Self::ItemTracking),
            "bloodrequest" | "blood" | "blooddonation" => Some(Self::BloodDonation),
            "ride" | "rides" | "ridesharing" => Some(Self::RideSharing),
            "vehiclerental" | "vehicle" | "rental" => Some(Self::VehicleRental),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    /// Collection name in the document store and in prompts.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::ItemTracking => "LostFound",
            Self::BloodDonation => "BloodRequest",
            Self::RideSharing => "Ride",
            Self::VehicleRental => "VehicleRental",
            Self::General => "General",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Routing decision produced once per request by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub domain: Domain,
    pub keywords: Vec<String>,
}

impl ClassificationResult {
    pub fn new(domain: Domain, keywords: Vec<String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { domain, keywords }
    }

    /// Build a result from a whitespace-delimited keyword string.
    pub fn from_keyword_str(domain: Domain, keywords: &str) -> Self {
        Self::new(
            domain,
            keywords.split_whitespace().map(str::to_string).collect(),
        )
    }

    /// The universal safe fallback: General, no keywords.
    pub fn general() -> Self {
        Self {
            domain: Domain::General,
            keywords: Vec::new(),
        }
    }

    /// Whether retrieval should run at all for this result.
    pub fn wants_retrieval(&self) -> bool {
        self.domain != Domain::General && !self.keywords.is_empty()
    }
}

/// One record returned by a domain search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvidenceItem {
    LostFound(LostFoundItem),
    Blood(BloodRequest),
    Ride(Ride),
    Vehicle(VehicleListing),
}

impl EvidenceItem {
    /// Decode a stored document into the record type of `domain`.
    pub fn decode(domain: Domain, document: serde_json::Value) -> AppResult<Self> {
        let item = match domain {
            Domain::ItemTracking => Self::LostFound(serde_json::from_value(document)?),
            Domain::BloodDonation => Self::Blood(serde_json::from_value(document)?),
            Domain::RideSharing => Self::Ride(serde_json::from_value(document)?),
            Domain::VehicleRental => Self::Vehicle(serde_json::from_value(document)?),
            Domain::General => {
                return Err(AppError::Validation(
                    "General has no record type".to_string(),
                ))
            }
        };
        Ok(item)
    }

    pub fn domain(&self) -> Domain {
        match self {
            Self::LostFound(_) => Domain::ItemTracking,
            Self::Blood(_) => Domain::BloodDonation,
            Self::Ride(_) => Domain::RideSharing,
            Self::Vehicle(_) => Domain::VehicleRental,
        }
    }
}

/// Bounded, domain-tagged evidence for one request.
///
/// An empty set is a meaningful outcome: it tells the answer stage that the
/// search found nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSet {
    domain: Domain,
    items: Vec<EvidenceItem>,
}

impl EvidenceSet {
    /// Build an evidence set, keeping at most `limit` items in order.
    pub fn new(domain: Domain, mut items: Vec<EvidenceItem>, limit: usize) -> Self {
        items.truncate(limit.min(MAX_EVIDENCE_LIMIT));
        Self { domain, items }
    }

    pub fn empty(domain: Domain) -> Self {
        Self {
            domain,
            items: Vec::new(),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_rejects_blank() {
        assert!(matches!(Question::parse(""), Err(AppError::Validation(_))));
        assert!(matches!(Question::parse("  \n\t"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_question_trims() {
        let q = Question::parse("  where is my wallet? ").unwrap();
        assert_eq!(q.as_str(), "where is my wallet?");
    }

    #[test]
    fn test_domain_wire_names() {
        assert_eq!(
            serde_json::to_string(&Domain::ItemTracking).unwrap(),
            "\"LostFound\""
        );
        let d: Domain = serde_json::from_str("\"Ride\"").unwrap();
        assert_eq!(d, Domain::RideSharing);
    }

    #[test]
    fn test_domain_parse_is_lenient() {
        assert_eq!(Domain::parse("lostfound"), Some(Domain::ItemTracking));
        assert_eq!(Domain::parse(" VehicleRental "), Some(Domain::VehicleRental));
        assert_eq!(Domain::parse("Weather"), None);
    }

    #[test]
    fn test_keyword_split() {
        let result = ClassificationResult::from_keyword_str(Domain::BloodDonation, " B+  City Hospital ");
        assert_eq!(result.keywords, vec!["B+", "City", "Hospital"]);
        assert!(result.wants_retrieval());
    }

    #[test]
    fn test_general_never_retrieves() {
        assert!(!ClassificationResult::general().wants_retrieval());
        let result = ClassificationResult::from_keyword_str(Domain::General, "hello there");
        assert!(!result.wants_retrieval());
        let result = ClassificationResult::from_keyword_str(Domain::RideSharing, "   ");
        assert!(!result.wants_retrieval());
    }

    #[test]
    fn test_evidence_set_is_bounded() {
        let doc = serde_json::json!({
            "title": "Hero Sprint",
            "vehicleType": "Cycle",
            "price": 50
        });
        let items: Vec<EvidenceItem> = (0..8)
            .map(|_| EvidenceItem::decode(Domain::VehicleRental, doc.clone()).unwrap())
            .collect();

        let set = EvidenceSet::new(Domain::VehicleRental, items, 5);
        assert_eq!(set.len(), 5);
        assert!(!set.is_empty());
        assert_eq!(set.items()[0].domain(), Domain::VehicleRental);
    }

    #[test]
    fn test_decode_general_fails() {
        assert!(EvidenceItem::decode(Domain::General, serde_json::json!({})).is_err());
    }
}
