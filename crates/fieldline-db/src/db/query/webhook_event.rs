//! Webhook deduplication ledger queries.
//!
//! The check-then-insert flow here has a deliberate race window; the unique
//! constraint on `(provider, event_id)` is what actually closes it. A second
//! insert losing that race is a successful no-op, not an error.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::connection::DbConnection;
use crate::db::schema::webhook_event;
use crate::model::webhook_event::NewWebhookEvent;

/// ## Summary
/// Returns a query to find a dedup row by `(provider, event_id)`.
#[must_use]
pub fn by_provider_and_event<'a>(
    provider: &'a str,
    event_id: &'a str,
) -> webhook_event::BoxedQuery<'a, diesel::pg::Pg> {
    webhook_event::table
        .filter(webhook_event::provider.eq(provider))
        .filter(webhook_event::event_id.eq(event_id))
        .into_boxed()
}

/// ## Summary
/// Checks whether a `(provider, event_id)` delivery has already been
/// recorded as processed.
///
/// ## Errors
/// Returns a database error if the lookup fails.
pub async fn already_processed(
    conn: &mut DbConnection<'_>,
    provider: &str,
    event_id: &str,
) -> diesel::QueryResult<bool> {
    diesel::select(diesel::dsl::exists(by_provider_and_event(
        provider, event_id,
    )))
    .get_result(conn)
    .await
}

/// ## Summary
/// Records a webhook delivery as processed. A unique-constraint violation
/// means another request already recorded it and is treated as success.
///
/// ## Returns
/// - `Ok(true)` if this call inserted the row
/// - `Ok(false)` if the row already existed (concurrent duplicate)
///
/// ## Errors
/// Returns any insert error other than a unique violation.
pub async fn record_processed(
    conn: &mut DbConnection<'_>,
    row: &NewWebhookEvent<'_>,
) -> diesel::QueryResult<bool> {
    match diesel::insert_into(webhook_event::table)
        .values(row)
        .execute(conn)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => {
            tracing::warn!(
                provider = row.provider,
                event_id = row.event_id,
                "Webhook already recorded by a concurrent request"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// ## Summary
/// Deletes dedup rows processed before `cutoff`, returning the count
/// removed. Called by the external retention job, not by request handlers.
///
/// ## Errors
/// Returns a database error if the delete fails.
pub async fn purge_older_than(
    conn: &mut DbConnection<'_>,
    cutoff: DateTime<Utc>,
) -> diesel::QueryResult<usize> {
    diesel::delete(webhook_event::table.filter(webhook_event::processed_at.lt(cutoff)))
        .execute(conn)
        .await
}

/// ## Summary
/// Whether a diesel error is specifically a unique-constraint violation.
#[must_use]
pub fn is_unique_violation(error: &diesel::result::Error) -> bool {
    matches!(
        error,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )
    )
}
