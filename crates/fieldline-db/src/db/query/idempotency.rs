//! Durable idempotency record queries, backing the shared cache store.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::db::connection::DbConnection;
use crate::db::schema::idempotency_record;
use crate::model::idempotency::{IdempotencyRecord, NewIdempotencyRecord};

/// ## Summary
/// Returns a query to find a non-expired record by cache key.
#[must_use]
pub fn fresh<'a>(
    cache_key: &'a str,
    now: DateTime<Utc>,
) -> idempotency_record::BoxedQuery<'a, diesel::pg::Pg> {
    idempotency_record::table
        .filter(idempotency_record::cache_key.eq(cache_key))
        .filter(idempotency_record::expires_at.gt(now))
        .into_boxed()
}

/// ## Summary
/// Looks up the memoized response for `cache_key`, ignoring expired rows.
///
/// ## Errors
/// Returns a database error if the lookup fails.
pub async fn find_fresh(
    conn: &mut DbConnection<'_>,
    cache_key: &str,
    now: DateTime<Utc>,
) -> diesel::QueryResult<Option<IdempotencyRecord>> {
    fresh(cache_key, now)
        .select(IdempotencyRecord::as_select())
        .first(conn)
        .await
        .optional()
}

/// ## Summary
/// Stores a memoized response, replacing any previous (typically expired)
/// row under the same cache key.
///
/// ## Errors
/// Returns a database error if the upsert fails.
pub async fn upsert(
    conn: &mut DbConnection<'_>,
    row: &NewIdempotencyRecord<'_>,
) -> diesel::QueryResult<usize> {
    diesel::insert_into(idempotency_record::table)
        .values(row)
        .on_conflict(idempotency_record::cache_key)
        .do_update()
        .set((
            idempotency_record::response.eq(excluded(idempotency_record::response)),
            idempotency_record::created_at.eq(diesel::dsl::now),
            idempotency_record::expires_at.eq(excluded(idempotency_record::expires_at)),
        ))
        .execute(conn)
        .await
}

/// ## Summary
/// Removes records past their expiry, returning the count removed.
///
/// ## Errors
/// Returns a database error if the delete fails.
pub async fn delete_expired(
    conn: &mut DbConnection<'_>,
    now: DateTime<Utc>,
) -> diesel::QueryResult<usize> {
    diesel::delete(idempotency_record::table.filter(idempotency_record::expires_at.le(now)))
        .execute(conn)
        .await
}

/// ## Summary
/// Removes every record. Test and operational reset path only.
///
/// ## Errors
/// Returns a database error if the delete fails.
pub async fn delete_all(conn: &mut DbConnection<'_>) -> diesel::QueryResult<usize> {
    diesel::delete(idempotency_record::table).execute(conn).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_sql<Q>(query: Q) -> String
    where
        Q: diesel::query_builder::QueryFragment<diesel::pg::Pg>,
    {
        diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string()
    }

    #[test]
    fn fresh_lookup_excludes_expired_rows() {
        let sql = query_sql(fresh("payments:key-1", Utc::now()));

        assert!(sql.contains("cache_key"), "should filter by cache_key");
        assert!(sql.contains("expires_at"), "should filter by expires_at");
    }

    #[test]
    fn expiry_sweep_filters_on_expires_at() {
        let now = Utc::now();
        let sql = query_sql(diesel::delete(
            idempotency_record::table.filter(idempotency_record::expires_at.le(now)),
        ));

        assert!(sql.starts_with("DELETE"), "should be a delete statement");
        assert!(sql.contains("expires_at"), "should filter by expires_at");
    }
}
