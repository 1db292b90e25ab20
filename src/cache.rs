//! Read-through / write-through caching of non-personalized generated tests.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::GenerationError;
use crate::model::{CurrentAffairsRequest, GeneratedTest, GenerationRequest};
use crate::store::{DocumentStore, GENERATED_TESTS};

/// Deterministic identifier of a reusable generation result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

/// '%' and '-' are escaped so that the '-' joins stay unambiguous.
fn key_component(raw: &str) -> String {
    raw.replace('%', "%25").replace('-', "%2D")
}

impl CacheKey {
    /// `mock-test-<exam>-<sorted subjects joined by '-'>-<year|latest>-<count>`
    pub fn for_mock_test(request: &GenerationRequest) -> Self {
        let mut subjects: Vec<String> = request.subjects.iter().map(|s| key_component(s)).collect();
        subjects.sort();
        let year = request.year.map_or_else(|| "latest".to_string(), |y| y.to_string());
        Self(format!(
            "mock-test-{}-{}-{}-{}",
            key_component(&request.exam),
            subjects.join("-"),
            year,
            request.question_count
        ))
    }

    /// `current-affairs-<YYYY-MM-DD>`
    pub fn for_current_affairs(request: &CurrentAffairsRequest) -> Self {
        Self(format!("current-affairs-{}", request.date_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request may use the cache only if it carries no personalization:
/// no weak topics and no weak-topic practice mode.
pub fn is_cache_eligible(request: &GenerationRequest) -> bool {
    request.weak_topics.is_empty() && !request.practice_weak_topics
}

/// Cache key for a mock-test request, or `None` when it must bypass the cache.
pub fn mock_test_key(request: &GenerationRequest) -> Option<CacheKey> {
    is_cache_eligible(request).then(|| CacheKey::for_mock_test(request))
}

/// Wraps generation with a lookup before and a write after, against one collection.
/// Store failures never fail the request.
#[derive(Debug, Clone)]
pub struct CacheGate {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
}

impl CacheGate {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, collection: GENERATED_TESTS }
    }

    /// Cached test for `key`. Read errors and unreadable documents count as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Option<GeneratedTest> {
        let document = match self.store.get(self.collection, key.as_str()).await {
            Ok(Some(document)) => document,
            Ok(None) => return None,
            Err(e) => {
                error!(cache_key = %key, error = %e, "Error reading from cache; generating instead");
                return None;
            }
        };
        match serde_json::from_value::<GeneratedTest>(document) {
            Ok(test) => Some(test),
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Cached document is not a test; ignoring it");
                None
            }
        }
    }

    /// Write `test` under `key`. Empty tests are not cached; errors are logged only.
    pub async fn store(&self, key: &CacheKey, test: &GeneratedTest) {
        if test.is_empty() {
            debug!(cache_key = %key, "Not caching an empty test");
            return;
        }
        let document = match serde_json::to_value(test) {
            Ok(document) => document,
            Err(e) => {
                error!(cache_key = %key, error = %e, "Cannot serialize test for caching");
                return;
            }
        };
        match self.store.put(self.collection, key.as_str(), document).await {
            Ok(()) => info!(cache_key = %key, questions = test.len(), "Saved test to cache"),
            Err(e) => error!(cache_key = %key, error = %e, "Error saving test to cache"),
        }
    }

    /// Serve from the cache when `key` is present and hit; otherwise run `generate` and
    /// write a successful result back. `None` bypasses the store in both directions.
    #[instrument(skip(self, generate), fields(cache_key = key.as_ref().map(CacheKey::as_str).unwrap_or("<bypass>")))]
    pub async fn resolve<F, Fut>(&self, key: Option<CacheKey>, generate: F) -> Result<GeneratedTest, GenerationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GeneratedTest, GenerationError>>,
    {
        let Some(key) = key else {
            info!("Personalized request, bypassing cache");
            return generate().await;
        };

        if let Some(cached) = self.lookup(&key).await {
            info!(questions = cached.len(), "Serving test from cache");
            return Ok(cached);
        }
        info!("No cache entry, generating");

        let test = generate().await?;
        self.store(&key, &test).await;
        Ok(test)
    }
}
