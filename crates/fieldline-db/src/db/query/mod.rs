pub mod idempotency;
pub mod schedule;
pub mod webhook_event;
