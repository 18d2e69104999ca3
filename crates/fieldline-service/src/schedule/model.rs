//! Native scheduling domain model.
//!
//! These types carry `chrono` instants and deliberately do not derive
//! serde: the wire shapes in [`super::wire`] are the only transportable
//! form, and the bootstrap functions are the only legal conversion points.
//! That keeps a wire-typed object from being used as if it were native
//! (and vice versa) anywhere else in the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fieldline_core::error::CoreError;

/// Inclusive wall-clock window a snapshot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Point-in-time, range-bounded extract of one company's scheduling data.
///
/// Transient transport artifact: built fresh per page load, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBootstrap {
    pub company_id: Uuid,
    pub range: DateRange,
    pub last_sync: DateTime<Utc>,
    pub jobs: Vec<Job>,
    pub technicians: Vec<Technician>,
}

/// Customer embedded by value in every job; never a separate fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub customer: Customer,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub recurrence: Option<RecurrenceRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schedule: TechnicianSchedule,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TechnicianSchedule {
    pub days_off: Vec<DateTime<Utc>>,
}

/// Recurrence parameters of a repeating job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub end_date: Option<DateTime<Utc>>,
}

/// Recurrence frequency. Non-temporal leaf shared by the native and wire
/// shapes, so it carries serde derives itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    #[must_use]
    pub const fn as_rrule(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(CoreError::InvalidInput(format!(
                "unknown recurrence frequency: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_round_trips_through_strings() {
        for freq in [
            Frequency::Daily,
            Frequency::Weekly,
            Frequency::Monthly,
            Frequency::Yearly,
        ] {
            let parsed: Frequency = freq.as_str().parse().expect("should parse its own name");
            assert_eq!(parsed, freq);
        }
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        assert!("fortnightly".parse::<Frequency>().is_err());
    }
}
