//! Document store abstraction.

use serde_json::Value;
use unilink_core::AppResult;

/// Keyword terms beyond this are ignored.
pub const MAX_QUERY_TERMS: usize = 8;

/// A bounded "any term in any field" search.
///
/// A document matches when at least one term occurs, case-insensitively and
/// as a literal substring, in at least one of `fields`. Matches are ordered
/// newest first; `offset` skips that many of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordQuery {
    terms: Vec<String>,
    fields: Vec<String>,
    limit: usize,
    offset: usize,
}

impl KeywordQuery {
    pub fn new<T, F>(terms: T, fields: F, limit: usize) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        for term in terms {
            let term = term.as_ref().trim().to_lowercase();
            if !term.is_empty() && !seen.contains(&term) {
                seen.push(term);
            }
        }
        seen.truncate(MAX_QUERY_TERMS);

        Self {
            terms: seen,
            fields: fields.into_iter().map(|f| f.as_ref().to_string()).collect(),
            limit,
            offset: 0,
        }
    }

    /// The same query, starting `offset` matches in.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// A query with no terms, fields or room for results matches nothing.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() || self.fields.is_empty() || self.limit == 0
    }
}

/// Backing store for domain records.
///
/// The chat pipeline only reads; `insert` exists for seeding.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs (e.g., "sqlite").
    fn backend_name(&self) -> &str;

    /// Return at most `query.limit()` matching documents from `collection`,
    /// skipping the first `query.offset()` matches.
    ///
    /// No match is an empty vector, not an error.
    async fn search(&self, collection: &str, query: &KeywordQuery) -> AppResult<Vec<Value>>;

    /// Store one document in `collection`.
    async fn insert(&self, collection: &str, document: &Value) -> AppResult<()>;
}
