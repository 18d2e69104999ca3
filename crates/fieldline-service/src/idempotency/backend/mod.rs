//! Pluggable stores behind the idempotency gate.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value as JsonValue;

use crate::error::ServiceResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// Capability interface a backing store must provide: keyed get/put with a
/// retention window plus an expiry sweep. The store only memoizes values;
/// single-flight coordination lives in the store layer above.
pub trait IdempotencyBackend: Send + Sync {
    fn get<'a>(
        &'a self,
        cache_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<Option<JsonValue>>> + Send + 'a>>;

    fn put<'a>(
        &'a self,
        cache_key: &'a str,
        value: JsonValue,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>>;

    fn sweep<'a>(&'a self) -> Pin<Box<dyn Future<Output = ServiceResult<usize>> + Send + 'a>>;

    fn clear<'a>(&'a self) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>>;
}
