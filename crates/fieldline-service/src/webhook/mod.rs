//! Webhook delivery deduplication.
//!
//! Providers redeliver events; processing one twice risks double side
//! effects (a second charge, a second message). The ledger records every
//! handled `(provider, event_id)` pair durably, and the guard here skips
//! deliveries already on record. Unlike the idempotency store, only a
//! "seen" flag persists; a suppressed redelivery yields `None`, not the
//! original handler result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use fieldline_core::constants::WEBHOOK_RETENTION_DAYS;
use fieldline_db::db::DbProvider;
use fieldline_db::db::query::webhook_event as webhook_query;
use fieldline_db::error::DbError;
use fieldline_db::model::webhook_event::NewWebhookEvent;

use crate::error::{ServiceError, ServiceResult};

#[cfg(test)]
mod dedup_tests;

/// Durable record of processed webhook deliveries.
pub trait WebhookLedger: Send + Sync {
    fn already_processed<'a>(
        &'a self,
        provider: &'a str,
        event_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<bool>> + Send + 'a>>;

    fn record_processed<'a>(
        &'a self,
        provider: &'a str,
        event_id: &'a str,
        metadata: Option<&'a JsonValue>,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>>;
}

/// Ledger over the shared Postgres store.
pub struct PgWebhookLedger {
    provider: Arc<dyn DbProvider>,
}

impl PgWebhookLedger {
    #[must_use]
    pub fn new(provider: Arc<dyn DbProvider>) -> Self {
        Self { provider }
    }
}

impl WebhookLedger for PgWebhookLedger {
    #[tracing::instrument(skip(self))]
    fn already_processed<'a>(
        &'a self,
        provider: &'a str,
        event_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            // An unreachable pool fails closed: without an answer the caller
            // must not run the guarded side effect.
            let mut conn = self.provider.get_connection().await?;

            match webhook_query::already_processed(&mut conn, provider, event_id).await {
                Ok(seen) => Ok(seen),
                Err(e) => {
                    let db_err = DbError::from(e);
                    if db_err.is_unreachable() {
                        return Err(ServiceError::Db(db_err));
                    }
                    // Transient read error: assume unprocessed and let the
                    // unique constraint catch a true duplicate at write time.
                    tracing::warn!(
                        provider,
                        event_id,
                        error = %db_err,
                        "Webhook dedup check failed, assuming unprocessed"
                    );
                    Ok(false)
                }
            }
        })
    }

    #[tracing::instrument(skip(self, metadata))]
    fn record_processed<'a>(
        &'a self,
        provider: &'a str,
        event_id: &'a str,
        metadata: Option<&'a JsonValue>,
    ) -> Pin<Box<dyn Future<Output = ServiceResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let row = NewWebhookEvent {
                provider,
                event_id,
                metadata,
            };

            let mut conn = self.provider.get_connection().await?;
            // Unique violations are swallowed inside the query as a no-op.
            webhook_query::record_processed(&mut conn, &row)
                .await
                .map_err(DbError::from)?;

            Ok(())
        })
    }
}

/// ## Summary
/// Whether a `(provider, event_id)` delivery is already on record.
///
/// ## Errors
/// Fails closed if the durable store is unreachable; the caller must not
/// proceed with processing in that case.
pub async fn check_webhook_processed(
    ledger: &dyn WebhookLedger,
    provider: &str,
    event_id: &str,
) -> ServiceResult<bool> {
    ledger.already_processed(provider, event_id).await
}

/// ## Summary
/// Records a delivery as processed. A concurrent duplicate insert is a
/// successful no-op.
///
/// ## Errors
/// Returns storage errors other than a unique violation.
pub async fn mark_webhook_processed(
    ledger: &dyn WebhookLedger,
    provider: &str,
    event_id: &str,
    metadata: Option<&JsonValue>,
) -> ServiceResult<()> {
    ledger.record_processed(provider, event_id, metadata).await
}

/// ## Summary
/// Runs `handler` unless this delivery was already processed, then records
/// it. A suppressed redelivery returns `None` without invoking `handler`;
/// only the seen flag is persisted, never the handler's result.
///
/// ## Errors
/// Propagates the dedup check (fail closed on unreachable storage), the
/// handler's own error unchanged, and any non-duplicate insert error from
/// recording. Recording happens after the handler has completed.
#[tracing::instrument(skip(ledger, handler, metadata))]
pub async fn with_webhook_deduplication<T, F, Fut>(
    ledger: &dyn WebhookLedger,
    provider: &str,
    event_id: &str,
    metadata: Option<&JsonValue>,
    handler: F,
) -> ServiceResult<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    if check_webhook_processed(ledger, provider, event_id).await? {
        tracing::info!(provider, event_id, "Webhook already processed, skipping");
        return Ok(None);
    }

    let result = handler().await.map_err(ServiceError::Operation)?;

    mark_webhook_processed(ledger, provider, event_id, metadata).await?;

    Ok(Some(result))
}

/// ## Summary
/// Deletes dedup rows past the retention window, returning the count
/// removed. Entry point for the external cleanup job; never called from
/// request handlers.
///
/// ## Errors
/// Returns a database error if the purge fails.
#[tracing::instrument(skip(db))]
pub async fn purge_expired_webhook_events(db: &dyn DbProvider) -> ServiceResult<usize> {
    let cutoff = Utc::now() - chrono::Duration::days(WEBHOOK_RETENTION_DAYS);

    let mut conn = db.get_connection().await?;
    let removed = webhook_query::purge_older_than(&mut conn, cutoff)
        .await
        .map_err(DbError::from)?;

    if removed > 0 {
        tracing::info!(removed, "Purged webhook dedup rows past retention");
    }

    Ok(removed)
}
