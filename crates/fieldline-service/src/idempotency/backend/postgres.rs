//! Durable idempotency backend over the shared Postgres store.
//!
//! Memoized responses live in `idempotency_record`, so replays are
//! recognized by every instance sharing the database. In-flight joining
//! remains per-process; across instances, two concurrent first deliveries
//! race on the upsert and converge on one stored response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value as JsonValue;

use fieldline_core::error::CoreError;
use fieldline_db::db::DbProvider;
use fieldline_db::db::query::idempotency as idempotency_query;
use fieldline_db::error::DbError;
use fieldline_db::model::idempotency::NewIdempotencyRecord;

use super::IdempotencyBackend;
use crate::error::{ServiceError, ServiceResult};

/// Shared durable key/value store for idempotency records.
pub struct PgBackend {
    provider: Arc<dyn DbProvider>,
}

impl PgBackend {
    #[must_use]
    pub fn new(provider: Arc<dyn DbProvider>) -> Self {
        Self { provider }
    }
}

impl IdempotencyBackend for PgBackend {
    #[tracing::instrument(skip(self))]
    fn get<'a>(
        &'a self,
        cache_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<Option<JsonValue>>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = self.provider.get_connection().await?;
            let record = idempotency_query::find_fresh(&mut conn, cache_key, Utc::now())
                .await
                .map_err(DbError::from)?;

            Ok(record.map(|r| r.response))
        })
    }

    #[tracing::instrument(skip(self, value))]
    fn put<'a>(
        &'a self,
        cache_key: &'a str,
        value: JsonValue,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let ttl = chrono::Duration::from_std(ttl).map_err(|e| {
                ServiceError::Core(CoreError::InvalidInput(format!(
                    "idempotency TTL out of range: {e}"
                )))
            })?;

            let row = NewIdempotencyRecord {
                cache_key,
                response: &value,
                expires_at: Utc::now() + ttl,
            };

            let mut conn = self.provider.get_connection().await?;
            idempotency_query::upsert(&mut conn, &row)
                .await
                .map_err(DbError::from)?;

            Ok(())
        })
    }

    #[tracing::instrument(skip(self))]
    fn sweep<'a>(&'a self) -> Pin<Box<dyn Future<Output = ServiceResult<usize>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = self.provider.get_connection().await?;
            let removed = idempotency_query::delete_expired(&mut conn, Utc::now())
                .await
                .map_err(DbError::from)?;

            Ok(removed)
        })
    }

    #[tracing::instrument(skip(self))]
    fn clear<'a>(&'a self) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = self.provider.get_connection().await?;
            idempotency_query::delete_all(&mut conn)
                .await
                .map_err(DbError::from)?;

            Ok(())
        })
    }
}
