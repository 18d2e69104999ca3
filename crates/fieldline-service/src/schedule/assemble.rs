//! Snapshot assembly from the scheduling read side.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fieldline_db::db::DbProvider;
use fieldline_db::db::query::schedule as schedule_query;
use fieldline_db::error::DbError;
use fieldline_db::model::schedule::{CustomerRow, JobRow, TechnicianRow};

use super::model::{
    Customer, DateRange, Job, RecurrenceRule, ScheduleBootstrap, Technician, TechnicianSchedule,
};
use crate::error::ServiceResult;

/// ## Summary
/// Builds a fresh snapshot of one company's jobs and technician roster for
/// the inclusive window `range`. `last_sync` is stamped at assembly time.
///
/// ## Errors
/// Returns a database error if any read fails, or a validation error for a
/// job row carrying an unknown recurrence frequency.
#[tracing::instrument(skip(db))]
pub async fn load_schedule_bootstrap(
    db: &dyn DbProvider,
    company_id: Uuid,
    range: DateRange,
) -> ServiceResult<ScheduleBootstrap> {
    let mut conn = db.get_connection().await?;

    let job_rows =
        schedule_query::jobs_with_customers(&mut conn, company_id, range.start, range.end)
            .await
            .map_err(DbError::from)?;
    let technician_rows = schedule_query::technicians_for_company(&mut conn, company_id)
        .await
        .map_err(DbError::from)?;

    let technician_ids: Vec<Uuid> = technician_rows.iter().map(|t| t.id).collect();
    let day_off_rows = schedule_query::days_off_for_technicians(&mut conn, &technician_ids)
        .await
        .map_err(DbError::from)?;

    let mut days_off: HashMap<Uuid, Vec<DateTime<Utc>>> = HashMap::new();
    for row in day_off_rows {
        days_off.entry(row.technician_id).or_default().push(row.day_off);
    }

    let jobs = job_rows
        .into_iter()
        .map(|(job, customer)| job_from_rows(job, customer))
        .collect::<ServiceResult<Vec<_>>>()?;

    let technicians = technician_rows
        .into_iter()
        .map(|row| technician_from_row(row, &mut days_off))
        .collect();

    tracing::debug!(
        jobs = jobs.len(),
        technicians = technician_ids.len(),
        "Assembled schedule bootstrap snapshot"
    );

    Ok(ScheduleBootstrap {
        company_id,
        range,
        last_sync: Utc::now(),
        jobs,
        technicians,
    })
}

fn job_from_rows(job: JobRow, customer: CustomerRow) -> ServiceResult<Job> {
    let recurrence = match job.recurrence_frequency {
        Some(frequency) => Some(RecurrenceRule {
            frequency: frequency.parse()?,
            interval: interval_from_column(job.recurrence_interval)?,
            end_date: job.recurrence_end_date,
        }),
        None => None,
    };

    Ok(Job {
        id: job.id,
        title: job.title,
        customer: Customer {
            id: customer.id,
            name: customer.name,
            email: customer.email,
            phone: customer.phone,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        },
        start_time: job.start_time,
        end_time: job.end_time,
        created_at: job.created_at,
        updated_at: job.updated_at,
        recurrence,
    })
}

// An absent interval means "every period"; a stored zero or negative one
// is bad data and gets the same treatment as an unknown frequency.
fn interval_from_column(raw: Option<i32>) -> Result<u32, fieldline_core::error::CoreError> {
    let Some(raw) = raw else {
        return Ok(1);
    };

    u32::try_from(raw)
        .ok()
        .filter(|interval| *interval > 0)
        .ok_or_else(|| {
            fieldline_core::error::CoreError::InvalidInput(format!(
                "recurrence interval out of range: {raw}"
            ))
        })
}

fn technician_from_row(
    row: TechnicianRow,
    days_off: &mut HashMap<Uuid, Vec<DateTime<Utc>>>,
) -> Technician {
    Technician {
        schedule: TechnicianSchedule {
            days_off: days_off.remove(&row.id).unwrap_or_default(),
        },
        id: row.id,
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_row(company_id: Uuid) -> CustomerRow {
        CustomerRow {
            id: Uuid::new_v4(),
            company_id,
            name: "Ada Homeowner".to_owned(),
            email: Some("ada@example.com".to_owned()),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn job_row(company_id: Uuid, customer_id: Uuid) -> JobRow {
        let now = Utc::now();
        JobRow {
            id: Uuid::new_v4(),
            company_id,
            customer_id,
            title: "Furnace inspection".to_owned(),
            start_time: now,
            end_time: now,
            recurrence_frequency: None,
            recurrence_interval: None,
            recurrence_end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn flattened_recurrence_columns_become_a_rule() {
        let company_id = Uuid::new_v4();
        let customer = customer_row(company_id);
        let mut job = job_row(company_id, customer.id);
        job.recurrence_frequency = Some("weekly".to_owned());
        job.recurrence_interval = Some(2);

        let mapped = job_from_rows(job, customer).expect("row should map");

        let rule = mapped.recurrence.expect("rule should be present");
        assert_eq!(rule.frequency, super::super::model::Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.end_date, None);
    }

    #[test]
    fn missing_interval_defaults_to_one() {
        let company_id = Uuid::new_v4();
        let customer = customer_row(company_id);
        let mut job = job_row(company_id, customer.id);
        job.recurrence_frequency = Some("daily".to_owned());

        let mapped = job_from_rows(job, customer).expect("row should map");

        assert_eq!(mapped.recurrence.expect("rule should be present").interval, 1);
    }

    #[test]
    fn nonpositive_interval_is_a_validation_error() {
        let company_id = Uuid::new_v4();
        for bad in [0, -3] {
            let customer = customer_row(company_id);
            let mut job = job_row(company_id, customer.id);
            job.recurrence_frequency = Some("weekly".to_owned());
            job.recurrence_interval = Some(bad);

            assert!(job_from_rows(job, customer).is_err());
        }
    }

    #[test]
    fn unknown_frequency_is_a_validation_error() {
        let company_id = Uuid::new_v4();
        let customer = customer_row(company_id);
        let mut job = job_row(company_id, customer.id);
        job.recurrence_frequency = Some("fortnightly".to_owned());

        assert!(job_from_rows(job, customer).is_err());
    }
}
