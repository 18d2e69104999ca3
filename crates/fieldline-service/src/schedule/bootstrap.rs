//! Explicit two-way transformation between the native schedule snapshot
//! and its wire shape.
//!
//! Every temporal field is converted here and nowhere else; adding a
//! temporal field to the model means updating exactly this pair of
//! functions. The encoding is RFC 3339 UTC with a trailing `Z` and
//! shortest-exact fractional seconds, so `deserialize(serialize(x)) == x`
//! holds field-for-field with no sub-second loss and no timezone drift.

use chrono::{DateTime, SecondsFormat, Utc};

use super::model::{
    Customer, DateRange, Job, RecurrenceRule, ScheduleBootstrap, Technician, TechnicianSchedule,
};
use super::wire::{
    CustomerWire, DateRangeWire, JobWire, RecurrenceRuleWire, ScheduleBootstrapWire,
    TechnicianScheduleWire, TechnicianWire,
};

fn encode_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_instant(encoded: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(encoded)?.with_timezone(&Utc))
}

/// ## Summary
/// Converts a native snapshot into its transport shape. Pure and total:
/// non-temporal fields pass through, absent optionals stay absent, and the
/// input is left untouched.
#[must_use]
pub fn serialize_schedule_bootstrap(payload: &ScheduleBootstrap) -> ScheduleBootstrapWire {
    ScheduleBootstrapWire {
        company_id: payload.company_id,
        range: DateRangeWire {
            start: encode_instant(payload.range.start),
            end: encode_instant(payload.range.end),
        },
        last_sync: encode_instant(payload.last_sync),
        jobs: payload.jobs.iter().map(serialize_job).collect(),
        technicians: payload.technicians.iter().map(serialize_technician).collect(),
    }
}

/// ## Summary
/// Reconstructs the native snapshot from its transport shape; the exact
/// structural inverse of [`serialize_schedule_bootstrap`].
///
/// ## Errors
/// Propagates the underlying date-parse error for a malformed temporal
/// string. No further validation is layered on top; the producer is
/// trusted to uphold the wire contract.
pub fn deserialize_schedule_bootstrap(
    payload: &ScheduleBootstrapWire,
) -> Result<ScheduleBootstrap, chrono::ParseError> {
    Ok(ScheduleBootstrap {
        company_id: payload.company_id,
        range: DateRange {
            start: decode_instant(&payload.range.start)?,
            end: decode_instant(&payload.range.end)?,
        },
        last_sync: decode_instant(&payload.last_sync)?,
        jobs: payload
            .jobs
            .iter()
            .map(deserialize_job)
            .collect::<Result<_, _>>()?,
        technicians: payload
            .technicians
            .iter()
            .map(deserialize_technician)
            .collect::<Result<_, _>>()?,
    })
}

fn serialize_job(job: &Job) -> JobWire {
    JobWire {
        id: job.id,
        title: job.title.clone(),
        customer: serialize_customer(&job.customer),
        start_time: encode_instant(job.start_time),
        end_time: encode_instant(job.end_time),
        created_at: encode_instant(job.created_at),
        updated_at: encode_instant(job.updated_at),
        recurrence: job.recurrence.as_ref().map(serialize_recurrence),
    }
}

fn deserialize_job(job: &JobWire) -> Result<Job, chrono::ParseError> {
    Ok(Job {
        id: job.id,
        title: job.title.clone(),
        customer: deserialize_customer(&job.customer)?,
        start_time: decode_instant(&job.start_time)?,
        end_time: decode_instant(&job.end_time)?,
        created_at: decode_instant(&job.created_at)?,
        updated_at: decode_instant(&job.updated_at)?,
        recurrence: job
            .recurrence
            .as_ref()
            .map(deserialize_recurrence)
            .transpose()?,
    })
}

fn serialize_customer(customer: &Customer) -> CustomerWire {
    CustomerWire {
        id: customer.id,
        name: customer.name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
        created_at: encode_instant(customer.created_at),
        updated_at: encode_instant(customer.updated_at),
    }
}

fn deserialize_customer(customer: &CustomerWire) -> Result<Customer, chrono::ParseError> {
    Ok(Customer {
        id: customer.id,
        name: customer.name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
        created_at: decode_instant(&customer.created_at)?,
        updated_at: decode_instant(&customer.updated_at)?,
    })
}

fn serialize_technician(technician: &Technician) -> TechnicianWire {
    TechnicianWire {
        id: technician.id,
        name: technician.name.clone(),
        created_at: encode_instant(technician.created_at),
        updated_at: encode_instant(technician.updated_at),
        schedule: TechnicianScheduleWire {
            days_off: technician
                .schedule
                .days_off
                .iter()
                .copied()
                .map(encode_instant)
                .collect(),
        },
    }
}

fn deserialize_technician(technician: &TechnicianWire) -> Result<Technician, chrono::ParseError> {
    Ok(Technician {
        id: technician.id,
        name: technician.name.clone(),
        created_at: decode_instant(&technician.created_at)?,
        updated_at: decode_instant(&technician.updated_at)?,
        schedule: TechnicianSchedule {
            days_off: technician
                .schedule
                .days_off
                .iter()
                .map(String::as_str)
                .map(decode_instant)
                .collect::<Result<_, _>>()?,
        },
    })
}

fn serialize_recurrence(rule: &RecurrenceRule) -> RecurrenceRuleWire {
    RecurrenceRuleWire {
        frequency: rule.frequency,
        interval: rule.interval,
        end_date: rule.end_date.map(encode_instant),
    }
}

fn deserialize_recurrence(rule: &RecurrenceRuleWire) -> Result<RecurrenceRule, chrono::ParseError> {
    Ok(RecurrenceRule {
        frequency: rule.frequency,
        interval: rule.interval,
        end_date: rule.end_date.as_deref().map(decode_instant).transpose()?,
    })
}
