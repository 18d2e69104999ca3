//! Wire shapes of the schedule bootstrap snapshot.
//!
//! Structurally parallel to [`super::model`], with every temporal field as
//! an RFC 3339 string. Field names are camelCase on the wire for the
//! client-side hydration step. Optional fields that are absent stay absent
//! in the JSON (no null sentinels).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::Frequency;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeWire {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBootstrapWire {
    pub company_id: Uuid,
    pub range: DateRangeWire,
    pub last_sync: String,
    pub jobs: Vec<JobWire>,
    pub technicians: Vec<TechnicianWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerWire {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobWire {
    pub id: Uuid,
    pub title: String,
    pub customer: CustomerWire,
    pub start_time: String,
    pub end_time: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRuleWire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianWire {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub schedule: TechnicianScheduleWire,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianScheduleWire {
    pub days_off: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRuleWire {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}
