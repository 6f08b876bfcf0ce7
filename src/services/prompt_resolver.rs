//! Prompt resolver with an in-process read-through cache.
//!
//! Entries carry a TTL so prompt edits become observable without a
//! process restart; the admin routes additionally invalidate the local
//! cache on update/delete. Concurrent population is last-writer-wins,
//! which is safe because all writers within a TTL window store the same
//! row.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::domain::prompts::PromptTemplate;
use crate::error::ApiError;
use crate::services::prompt_store::PromptStore;

/// Prompt text plus the template metadata the pipeline consumes.
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    pub text: String,
    pub model: Option<String>,
    pub supports_images: bool,
    pub temperature: Option<f32>,
}

impl From<PromptTemplate> for ResolvedPrompt {
    fn from(template: PromptTemplate) -> Self {
        let temperature = template.temperature();
        Self {
            text: template.text,
            model: template.model,
            supports_images: template.supports_images,
            temperature,
        }
    }
}

struct CacheEntry {
    prompt: ResolvedPrompt,
    stored_at: Instant,
}

/// Read-through prompt cache over a [`PromptStore`].
#[derive(Clone)]
pub struct PromptResolver {
    store: Arc<dyn PromptStore>,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl PromptResolver {
    pub fn new(store: Arc<dyn PromptStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Resolve a prompt by key.
    ///
    /// Unknown keys fail immediately with `Prompt not found: <key>`; no
    /// model call happens after this error.
    #[instrument(skip(self))]
    pub async fn resolve(&self, key: &str) -> Result<ResolvedPrompt, ApiError> {
        if let Some(hit) = self.cached(key) {
            debug!(key = key, "Prompt cache hit");
            return Ok(hit);
        }

        let template = self
            .store
            .find_by_key(key)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound(format!("Prompt not found: {}", key)))?;

        let resolved = ResolvedPrompt::from(template);
        self.cache.write().insert(
            key.to_string(),
            CacheEntry {
                prompt: resolved.clone(),
                stored_at: Instant::now(),
            },
        );
        debug!(key = key, "Prompt cached");

        Ok(resolved)
    }

    /// Drop a cached entry (called by the prompt admin routes on
    /// update/delete so a single-process deployment observes edits
    /// immediately).
    pub fn invalidate(&self, key: &str) {
        self.cache.write().remove(key);
    }

    fn cached(&self, key: &str) -> Option<ResolvedPrompt> {
        let cache = self.cache.read();
        let entry = cache.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.prompt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prompts::PromptTemplate;
    use anyhow::Result;
    use chrono::Utc;
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct MemStore {
        prompts: Mutex<HashMap<String, PromptTemplate>>,
        lookups: Mutex<u32>,
    }

    impl MemStore {
        fn with(key: &str, text: &str) -> Self {
            let mut prompts = HashMap::new();
            prompts.insert(key.to_string(), template(key, text));
            Self {
                prompts: Mutex::new(prompts),
                lookups: Mutex::new(0),
            }
        }

        fn set(&self, key: &str, text: &str) {
            self.prompts
                .lock()
                .insert(key.to_string(), template(key, text));
        }

        fn lookups(&self) -> u32 {
            *self.lookups.lock()
        }
    }

    fn template(key: &str, text: &str) -> PromptTemplate {
        PromptTemplate {
            id: Uuid::new_v4(),
            key: key.to_string(),
            text: text.to_string(),
            model: None,
            supports_images: false,
            context_config: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait::async_trait]
    impl PromptStore for MemStore {
        async fn find_by_key(&self, key: &str) -> Result<Option<PromptTemplate>> {
            *self.lookups.lock() += 1;
            Ok(self.prompts.lock().get(key).cloned())
        }
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let store = Arc::new(MemStore::with("plan_analysis", "Analyze the plan."));
        let resolver = PromptResolver::new(store.clone(), Duration::from_secs(300));

        resolver.resolve("plan_analysis").await.unwrap();
        let resolved = resolver.resolve("plan_analysis").await.unwrap();

        assert_eq!(resolved.text, "Analyze the plan.");
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn unknown_key_fails_immediately() {
        let store = Arc::new(MemStore::with("plan_analysis", "Analyze."));
        let resolver = PromptResolver::new(store, Duration::from_secs(300));

        let err = resolver.resolve("missing").await.unwrap_err();
        assert!(err.to_string().contains("Prompt not found: missing"));
    }

    #[tokio::test]
    async fn invalidation_exposes_store_updates() {
        let store = Arc::new(MemStore::with("plan_analysis", "old text"));
        let resolver = PromptResolver::new(store.clone(), Duration::from_secs(300));

        assert_eq!(resolver.resolve("plan_analysis").await.unwrap().text, "old text");

        store.set("plan_analysis", "new text");
        // Still cached until invalidated.
        assert_eq!(resolver.resolve("plan_analysis").await.unwrap().text, "old text");

        resolver.invalidate("plan_analysis");
        assert_eq!(resolver.resolve("plan_analysis").await.unwrap().text, "new text");
    }

    #[tokio::test]
    async fn zero_ttl_reads_through_every_time() {
        let store = Arc::new(MemStore::with("plan_analysis", "text"));
        let resolver = PromptResolver::new(store.clone(), Duration::ZERO);

        resolver.resolve("plan_analysis").await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        resolver.resolve("plan_analysis").await.unwrap();

        assert_eq!(store.lookups(), 2);
    }
}
