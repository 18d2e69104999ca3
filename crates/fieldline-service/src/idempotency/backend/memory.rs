//! In-process idempotency backend.
//!
//! Per-instance only: replays are recognized within this process, not
//! across a multi-instance deployment. Production deployments that need
//! the instance-wide guarantee select the durable backend instead.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;

use super::IdempotencyBackend;
use crate::error::ServiceResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: JsonValue,
    expires_at: Instant,
}

/// TTL-bounded in-memory key/value store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl IdempotencyBackend for MemoryBackend {
    fn get<'a>(
        &'a self,
        cache_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<Option<JsonValue>>> + Send + 'a>> {
        // Expired entries read as misses; the sweep reclaims them later.
        let hit = self
            .lock_entries()
            .get(cache_key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone());

        Box::pin(async move { Ok(hit) })
    }

    fn put<'a>(
        &'a self,
        cache_key: &'a str,
        value: JsonValue,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lock_entries().insert(cache_key.to_owned(), entry);

        Box::pin(async move { Ok(()) })
    }

    fn sweep<'a>(&'a self) -> Pin<Box<dyn Future<Output = ServiceResult<usize>> + Send + 'a>> {
        let now = Instant::now();
        let evicted = {
            let mut entries = self.lock_entries();
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at > now);
            before - entries.len()
        };

        Box::pin(async move { Ok(evicted) })
    }

    fn clear<'a>(&'a self) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>> {
        self.lock_entries().clear();

        Box::pin(async move { Ok(()) })
    }
}
