//! UniLink Core Library
//!
//! This crate provides the foundational pieces shared by every UniLink crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - The request-scoped chat data model (questions, domains, evidence)

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod records;

// Re-export commonly used types
pub use config::AppConfig;
pub use domain::{ClassificationResult, Domain, EvidenceItem, EvidenceSet, Question};
pub use error::{AppError, AppResult};
