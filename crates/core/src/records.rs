//! Typed domain records as stored by the campus platform.
//!
//! Field names follow the stored documents (camelCase). Only the fields
//! the chat assistant can talk about are modeled; anything else in a
//! document is ignored on decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lost or found item report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LostFoundItem {
    /// "lost" or "found"
    pub item_type: String,
    pub item_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub description: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Where a found item is being kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
    /// "open" or "claimed"
    #[serde(default = "default_open")]
    pub status: String,
}

/// A request for blood donors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    pub patient_name: String,
    /// One of A+, A-, B+, B-, AB+, AB-, O+, O-
    pub blood_group: String,
    /// Usually a hospital
    pub location: String,
    pub contact_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// "active" or "closed"
    #[serde(default = "default_active")]
    pub status: String,
}

/// A ride offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub start_location: String,
    pub end_location: String,
    pub vehicle_type: String,
    pub cost_per_person: f64,
    pub seats_available: u32,
    pub departure_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A vehicle offered for rent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleListing {
    /// e.g. "Yamaha MT-15"
    pub title: String,
    /// Bike, Scooty, Car or Cycle
    pub vehicle_type: String,
    /// "available" or "rented"
    #[serde(default = "default_available")]
    pub status: String,
    pub price: f64,
    /// Billing period: day, week or month
    #[serde(default = "default_rate")]
    pub rate: String,
    #[serde(default)]
    pub specs: Vec<String>,
}

fn default_open() -> String {
    "open".to_string()
}

fn default_active() -> String {
    "active".to_string()
}

fn default_available() -> String {
    "available".to_string()
}

fn default_rate() -> String {
    "day".to_string()
}
