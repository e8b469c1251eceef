//! Document store abstraction
//!
//! Collection-based document persistence behind an async trait. Documents
//! cross this boundary as `serde_json::Value`; the typed handles in
//! [`crate::collections`] do the (de)serialization.
//!
//! `update_if` is the conditional update every status transition goes
//! through: "set funded only if currently pending". Implementations must
//! make it atomic with respect to other writes on the same document.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use kredible_common::KredibleError;

/// Errors from document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("malformed document in {collection}: {reason}")]
    Malformed { collection: String, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for KredibleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => KredibleError::NotFound {
                kind: "document",
                id: format!("{collection}/{id}"),
            },
            StoreError::Malformed { collection, reason } => {
                KredibleError::Serialization(format!("{collection}: {reason}"))
            }
            StoreError::Backend(msg) => KredibleError::Storage(msg),
        }
    }
}

/// Comparison applied by a query filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One field predicate for a query
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lte, value)
    }
}

/// Sort order for query results
#[derive(Debug, Clone)]
pub struct Order {
    pub field: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Trait for document store backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, returning its id.
    ///
    /// A non-empty string `id` field on the document is honored; otherwise
    /// an id is generated and written into the stored document.
    async fn insert(&self, collection: &str, doc: Value) -> Result<String, StoreError>;

    /// Get a document by id
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// All documents whose `field` equals `value`
    async fn get_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>, StoreError>;

    /// Merge the patch's top-level fields into the document
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    /// Conditional update: merge `patch` only while `guard_field` still
    /// equals `expected`. Returns whether the swap happened. Atomic with
    /// respect to other writes on the same document.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        guard_field: &str,
        expected: &Value,
        patch: Value,
    ) -> Result<bool, StoreError>;

    /// Delete a document
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Filtered, ordered, limited scan of a collection
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&Order>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError>;
}
