//! Read-side queries feeding the schedule bootstrap snapshot.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::connection::DbConnection;
use crate::db::schema::{customer, job, technician, technician_day_off};
use crate::model::schedule::{CustomerRow, JobRow, TechnicianDayOffRow, TechnicianRow};

/// ## Summary
/// Returns a query selecting a company's jobs overlapping the inclusive
/// wall-clock window `[start, end]`.
#[must_use]
pub fn jobs_overlapping(
    company_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> job::BoxedQuery<'static, diesel::pg::Pg> {
    job::table
        .filter(job::company_id.eq(company_id))
        .filter(job::start_time.le(end))
        .filter(job::end_time.ge(start))
        .order(job::start_time.asc())
        .into_boxed()
}

/// ## Summary
/// Loads jobs overlapping the window, each paired with its customer. The
/// customer travels embedded by value; callers never fetch it separately.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn jobs_with_customers(
    conn: &mut DbConnection<'_>,
    company_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> diesel::QueryResult<Vec<(JobRow, CustomerRow)>> {
    job::table
        .inner_join(customer::table)
        .filter(job::company_id.eq(company_id))
        .filter(job::start_time.le(end))
        .filter(job::end_time.ge(start))
        .order(job::start_time.asc())
        .select((JobRow::as_select(), CustomerRow::as_select()))
        .load(conn)
        .await
}

/// ## Summary
/// Loads a company's technician roster.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn technicians_for_company(
    conn: &mut DbConnection<'_>,
    company_id: Uuid,
) -> diesel::QueryResult<Vec<TechnicianRow>> {
    technician::table
        .filter(technician::company_id.eq(company_id))
        .order(technician::name.asc())
        .select(TechnicianRow::as_select())
        .load(conn)
        .await
}

/// ## Summary
/// Loads days-off rows for the given technicians, ordered for grouping.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn days_off_for_technicians(
    conn: &mut DbConnection<'_>,
    technician_ids: &[Uuid],
) -> diesel::QueryResult<Vec<TechnicianDayOffRow>> {
    technician_day_off::table
        .filter(technician_day_off::technician_id.eq_any(technician_ids))
        .order((
            technician_day_off::technician_id.asc(),
            technician_day_off::day_off.asc(),
        ))
        .select(TechnicianDayOffRow::as_select())
        .load(conn)
        .await
}
