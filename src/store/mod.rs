//! Document storage: keyed JSON documents grouped in collections, with equality
//! queries on top-level fields.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::fmt::Debug;

use crate::error::StoreError;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Collection holding cached generated tests, keyed by cache key.
pub const GENERATED_TESTS: &str = "generatedMockTests";
/// Collection holding historical previous-year questions, keyed by generated ids.
pub const PYQ_QUESTIONS: &str = "pyq_questions";

/// Equality constraint on one top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }

    pub fn matches(&self, document: &Value) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write `document` under `key`, replacing any previous document.
    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<(), StoreError>;

    /// Store `document` under a fresh id and return the id.
    async fn insert(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        let id = new_document_id();
        self.put(collection, &id, document).await?;
        Ok(id)
    }

    /// Up to `limit` documents matching every filter.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: usize,
    ) -> Result<Vec<Value>, StoreError>;
}

/// Time-ordered id with a random suffix.
pub fn new_document_id() -> String {
    format!("{:016x}{:08x}", Utc::now().timestamp_micros(), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_top_level_field_only() {
        let doc = json!({"exam": "SSC CGL", "year": 2022, "meta": {"exam": "other"}});
        assert!(FieldFilter::eq("exam", "SSC CGL").matches(&doc));
        assert!(FieldFilter::eq("year", 2022).matches(&doc));
        assert!(!FieldFilter::eq("year", "2022").matches(&doc));
        assert!(!FieldFilter::eq("missing", "x").matches(&doc));
    }

    #[test]
    fn document_ids_are_unique() {
        assert_ne!(new_document_id(), new_document_id());
    }
}
