//! Business-facing services of the Fieldline platform core: the
//! idempotency/deduplication gates for externally triggered side effects,
//! and assembly plus wire (de)serialization of schedule bootstrap snapshots.

pub mod error;
pub mod idempotency;
pub mod schedule;
pub mod webhook;
