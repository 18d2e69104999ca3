//! Row models for the scheduling read side.

use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use uuid::Uuid;

use crate::db::schema::{customer, job, technician, technician_day_off};

/// Customer row, embedded by value in every job snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = customer)]
#[diesel(check_for_backend(Pg))]
pub struct CustomerRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scheduled job row. Recurrence parameters are stored flattened; a job
/// without `recurrence_frequency` is a one-off visit.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = job)]
#[diesel(belongs_to(CustomerRow, foreign_key = customer_id))]
#[diesel(check_for_backend(Pg))]
pub struct JobRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub recurrence_frequency: Option<String>,
    pub recurrence_interval: Option<i32>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = technician)]
#[diesel(check_for_backend(Pg))]
pub struct TechnicianRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = technician_day_off)]
#[diesel(belongs_to(TechnicianRow, foreign_key = technician_id))]
#[diesel(check_for_backend(Pg))]
pub struct TechnicianDayOffRow {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub day_off: DateTime<Utc>,
}
