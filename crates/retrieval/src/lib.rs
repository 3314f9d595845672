//! Classification and retrieval for UniLink chat.
//!
//! This crate decides which data domain a question concerns and fetches a
//! small, bounded set of matching records from the document store:
//! - [`QueryClassifier`]: question → domain + keywords (fail-soft)
//! - [`SearchAdapter`]: keyword search over one domain's fields
//! - [`Retriever`]: classification → evidence set (fail-soft)
//! - [`SqliteStore`]: the document store backing the adapters

pub mod adapter;
pub mod classifier;
pub mod retriever;
pub mod seed;
pub mod sqlite;
pub mod store;

pub use adapter::{DomainProfile, SearchAdapter};
pub use classifier::{parse_classification, QueryClassifier, DEFAULT_CLASSIFIER_TIMEOUT};
pub use retriever::Retriever;
pub use seed::{seed_store, SeedBundle, SeedReport};
pub use sqlite::SqliteStore;
pub use store::{DocumentStore, KeywordQuery, MAX_QUERY_TERMS};
