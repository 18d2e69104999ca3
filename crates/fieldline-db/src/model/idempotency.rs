use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use serde_json::Value as JsonValue;

use crate::db::schema::idempotency_record;

/// Cached result of a guarded operation, keyed by the scope-qualified
/// idempotency key. Rows past `expires_at` are ignored by reads and removed
/// by the periodic sweep.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = idempotency_record)]
#[diesel(primary_key(cache_key))]
#[diesel(check_for_backend(Pg))]
pub struct IdempotencyRecord {
    pub cache_key: String,
    pub response: JsonValue,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Insert struct memoizing a successful guarded operation.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = idempotency_record)]
pub struct NewIdempotencyRecord<'a> {
    pub cache_key: &'a str,
    pub response: &'a JsonValue,
    pub expires_at: DateTime<Utc>,
}
