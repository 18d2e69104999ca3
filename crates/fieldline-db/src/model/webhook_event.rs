use chrono::{DateTime, Utc};
use diesel::{pg::Pg, prelude::*};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::db::schema::webhook_event;

/// Record of a provider-pushed event that has already been handled.
///
/// Uniqueness is enforced on `(provider, event_id)`, never on the raw event
/// ID alone, so identical IDs from different providers cannot collide.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = webhook_event)]
#[diesel(check_for_backend(Pg))]
pub struct WebhookEvent {
    pub id: Uuid,
    pub provider: String,
    pub event_id: String,
    pub processed_at: DateTime<Utc>,
    pub metadata: Option<JsonValue>,
}

/// Insert struct recording a newly processed webhook delivery.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_event)]
pub struct NewWebhookEvent<'a> {
    pub provider: &'a str,
    pub event_id: &'a str,
    pub metadata: Option<&'a JsonValue>,
}
