//! SQLite-backed document store.
//!
//! Documents are stored as JSON text in a single table keyed by collection.
//! Keyword search is pushed into SQL with `json_extract` + `LIKE`, so only
//! the bounded result set crosses into Rust. SQLite's own `LIKE` folds ASCII
//! only, so field values go through `unilink_lower` (Rust `to_lowercase`)
//! before matching.

use crate::store::{DocumentStore, KeywordQuery};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use unilink_core::{AppError, AppResult};

/// Document store over one SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store file.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Store(format!("Failed to open SQLite store: {}", e)))?;
        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Self::init(conn)
    }

    /// A private in-memory store.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Store(format!("Failed to open SQLite store: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.create_scalar_function(
            "unilink_lower",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            unicode_lower,
        )
        .map_err(|e| AppError::Store(format!("Failed to register SQL function: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
        )
        .map_err(|e| AppError::Store(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> AppResult<usize> {
        let collection = collection.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| AppError::Store(format!("Failed to count documents: {}", e)))
        })
        .await
    }

    /// Run blocking SQLite work off the async runtime.
    async fn with_conn<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| AppError::Store("SQLite connection lock poisoned".to_string()))?;
            work(&guard)
        })
        .await
        .map_err(|e| AppError::Store(format!("Store task failed: {}", e)))?
    }
}

/// Unicode lowercase of a scalar; NULL and blobs stay NULL.
fn unicode_lower(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    let lowered = match ctx.get_raw(0) {
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    };
    Ok(lowered)
}

/// Escape `LIKE` metacharacters so terms match literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Build the search statement and its positional parameters.
fn search_sql(collection: &str, query: &KeywordQuery) -> (String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut values = vec![SqlValue::Text(collection.to_string())];

    for field in query.fields() {
        for term in query.terms() {
            conditions.push("unilink_lower(json_extract(body, ?)) LIKE ? ESCAPE '\\'");
            values.push(SqlValue::Text(format!("$.{}", field)));
            values.push(SqlValue::Text(like_pattern(term)));
        }
    }
    values.push(SqlValue::Integer(query.limit() as i64));
    values.push(SqlValue::Integer(query.offset() as i64));

    let sql = format!(
        "SELECT body FROM documents WHERE collection = ? AND ({}) ORDER BY id DESC LIMIT ? OFFSET ?",
        conditions.join(" OR ")
    );
    (sql, values)
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn search(&self, collection: &str, query: &KeywordQuery) -> AppResult<Vec<Value>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let (sql, values) = search_sql(collection, query);

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| AppError::Store(format!("Failed to prepare search: {}", e)))?;

            let rows = stmt
                .query_map(rusqlite::params_from_iter(values), |row| row.get::<_, String>(0))
                .map_err(|e| AppError::Store(format!("Failed to run search: {}", e)))?;

            let mut documents = Vec::new();
            for row in rows {
                let body = row.map_err(|e| AppError::Store(format!("Failed to read row: {}", e)))?;
                documents.push(serde_json::from_str(&body)?);
            }
            Ok(documents)
        })
        .await
    }

    async fn insert(&self, collection: &str, document: &Value) -> AppResult<()> {
        if !document.is_object() {
            return Err(AppError::Store(format!(
                "Documents must be JSON objects (collection {})",
                collection
            )));
        }

        let collection = collection.to_string();
        let body = serde_json::to_string(document)?;
        let created_at = chrono::Utc::now().to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, body, created_at) VALUES (?1, ?2, ?3)",
                params![collection, body, created_at],
            )
            .map_err(|e| AppError::Store(format!("Failed to insert document: {}", e)))?;
            Ok(())
        })
        .await
    }
}
