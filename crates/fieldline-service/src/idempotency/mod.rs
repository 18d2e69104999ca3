//! At-most-once execution gate for externally retried operations.
//!
//! A caller-supplied key, qualified by a scope prefix, identifies a request
//! across retries. The first arrival executes the guarded operation and the
//! result is memoized; replays observe the memoized result without a second
//! execution. Concurrent arrivals on a fresh key join the single in-flight
//! execution through a process-local flight registry instead of racing a
//! read-then-write on the backend.
//!
//! Only successful results are memoized. A failed execution leaves the key
//! immediately retryable.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::watch;

use fieldline_core::config::{IdempotencyBackendKind, IdempotencyConfig};
use fieldline_db::db::DbProvider;

use crate::error::{ServiceError, ServiceResult};

pub mod backend;
pub mod header;
pub mod sweeper;

pub use backend::{IdempotencyBackend, MemoryBackend, PgBackend};

#[cfg(test)]
mod store_tests;

/// Result of a guarded operation together with whether it was served from
/// a prior execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotentResponse<T> {
    pub response: T,
    pub was_idempotent: bool,
}

/// Broadcast state of one in-flight execution.
#[derive(Debug, Clone)]
enum FlightState {
    Pending,
    Done(JsonValue),
    Failed(String),
}

type FlightRx = watch::Receiver<FlightState>;

/// Removes the flight registry entry when the leader finishes or its
/// future is dropped. Without this, a dropped leader would leave the key
/// pointing at a dead flight and every later caller would fail as a
/// joiner of it.
struct FlightGuard<'a> {
    store: &'a IdempotencyStore,
    cache_key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.store.remove_flight(self.cache_key);
    }
}

/// Keyed gate ensuring a guarded operation executes at most once.
///
/// Constructed once at process start and passed by reference to request
/// handlers; the backend decides whether memoized results are shared
/// across instances ([`MemoryBackend`] is per-process, [`PgBackend`] is
/// durable and shared).
pub struct IdempotencyStore {
    backend: Arc<dyn IdempotencyBackend>,
    ttl: Duration,
    flights: Mutex<HashMap<String, FlightRx>>,
}

impl IdempotencyStore {
    #[must_use]
    pub fn new(backend: Arc<dyn IdempotencyBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the store with the configured backend. The durable backend
    /// shares the database pool; the in-memory backend is per-instance.
    #[must_use]
    pub fn from_config(config: &IdempotencyConfig, provider: &Arc<dyn DbProvider>) -> Self {
        let backend: Arc<dyn IdempotencyBackend> = match config.backend {
            IdempotencyBackendKind::Memory => Arc::new(MemoryBackend::new()),
            IdempotencyBackendKind::Postgres => Arc::new(PgBackend::new(Arc::clone(provider))),
        };

        Self::new(backend, config.ttl())
    }

    /// ## Summary
    /// Runs `operation` at most once per `(scope, key)` pair. A `None` key
    /// disables deduplication for this call: the operation always runs and
    /// `was_idempotent` is `false`.
    ///
    /// Replays within the retention window observe the memoized response.
    /// Concurrent calls on the same fresh key share a single execution;
    /// exactly one invokes `operation`, the rest await its outcome.
    ///
    /// ## Errors
    /// Propagates the operation's own error unchanged (nothing is cached in
    /// that case), backend read/write failures, and
    /// [`ServiceError::JoinedFlightFailed`] for callers that joined a
    /// failing execution.
    #[tracing::instrument(skip(self, key, operation), fields(scope = scope))]
    pub async fn with_idempotency<T, F, Fut>(
        &self,
        key: Option<&str>,
        scope: &str,
        operation: F,
    ) -> ServiceResult<IdempotentResponse<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let Some(key) = key else {
            let response = operation().await.map_err(ServiceError::Operation)?;
            return Ok(IdempotentResponse {
                response,
                was_idempotent: false,
            });
        };

        // Scope-qualified to keep identical literal keys from colliding
        // across operation types.
        let cache_key = format!("{scope}:{key}");

        enum Role {
            Leader(watch::Sender<FlightState>),
            Joiner(FlightRx),
        }

        let role = {
            let mut flights = self.lock_flights();
            if let Some(rx) = flights.get(&cache_key) {
                Role::Joiner(rx.clone())
            } else {
                let (tx, rx) = watch::channel(FlightState::Pending);
                flights.insert(cache_key.clone(), rx);
                Role::Leader(tx)
            }
        };

        match role {
            Role::Joiner(rx) => Self::join_flight(rx).await,
            Role::Leader(tx) => {
                // The guard owns the registry entry for the whole flight.
                // If this future is dropped mid-flight (request timeout,
                // client disconnect), the key is released so the next
                // caller leads a fresh execution instead of joining a dead
                // flight.
                let _guard = FlightGuard {
                    store: self,
                    cache_key: &cache_key,
                };
                self.lead_flight(&cache_key, &tx, operation).await
            }
        }
    }

    /// ## Summary
    /// Evicts expired entries from the backend, returning the count removed.
    ///
    /// ## Errors
    /// Returns a backend error if the sweep fails.
    pub async fn sweep(&self) -> ServiceResult<usize> {
        self.backend.sweep().await
    }

    /// ## Summary
    /// Drops every memoized entry. Intended for tests and operational
    /// resets, not request paths.
    ///
    /// ## Errors
    /// Returns a backend error if the clear fails.
    pub async fn clear(&self) -> ServiceResult<()> {
        self.backend.clear().await
    }

    async fn lead_flight<T, F, Fut>(
        &self,
        cache_key: &str,
        tx: &watch::Sender<FlightState>,
        operation: F,
    ) -> ServiceResult<IdempotentResponse<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        // The flight was reserved before this lookup, so a concurrent
        // caller can no longer slip into a second execution between the
        // read and the write.
        match self.backend.get(cache_key).await {
            Ok(Some(value)) => {
                let parsed = serde_json::from_value::<T>(value.clone());
                tx.send_replace(FlightState::Done(value));
                let response = parsed.map_err(ServiceError::from)?;
                return Ok(IdempotentResponse {
                    response,
                    was_idempotent: true,
                });
            }
            Ok(None) => {}
            Err(e) => {
                tx.send_replace(FlightState::Failed(e.to_string()));
                return Err(e);
            }
        }

        match operation().await {
            Ok(response) => {
                let value = match serde_json::to_value(&response) {
                    Ok(value) => value,
                    Err(e) => {
                        tx.send_replace(FlightState::Failed(e.to_string()));
                        return Err(ServiceError::from(e));
                    }
                };

                if let Err(e) = self.backend.put(cache_key, value.clone(), self.ttl).await {
                    tx.send_replace(FlightState::Failed(e.to_string()));
                    return Err(e);
                }

                tx.send_replace(FlightState::Done(value));
                Ok(IdempotentResponse {
                    response,
                    was_idempotent: false,
                })
            }
            Err(e) => {
                // Failed attempts are not memoized; the key is immediately
                // retryable.
                tx.send_replace(FlightState::Failed(e.to_string()));
                Err(ServiceError::Operation(e))
            }
        }
    }

    async fn join_flight<T>(mut rx: FlightRx) -> ServiceResult<IdempotentResponse<T>>
    where
        T: DeserializeOwned,
    {
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                FlightState::Pending => {
                    if rx.changed().await.is_err() {
                        return Err(ServiceError::FlightAbandoned);
                    }
                }
                FlightState::Done(value) => {
                    let response = serde_json::from_value(value)?;
                    return Ok(IdempotentResponse {
                        response,
                        was_idempotent: true,
                    });
                }
                FlightState::Failed(message) => {
                    return Err(ServiceError::JoinedFlightFailed(message));
                }
            }
        }
    }

    fn remove_flight(&self, cache_key: &str) {
        self.lock_flights().remove(cache_key);
    }

    fn lock_flights(&self) -> MutexGuard<'_, HashMap<String, FlightRx>> {
        match self.flights.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
