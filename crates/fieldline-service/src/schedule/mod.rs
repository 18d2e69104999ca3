//! Schedule bootstrap snapshots: assembly from the read side, lossless
//! wire (de)serialization, and recurrence expansion.

pub mod assemble;
pub mod bootstrap;
pub mod expand;
pub mod model;
pub mod wire;

pub use assemble::load_schedule_bootstrap;
pub use bootstrap::{deserialize_schedule_bootstrap, serialize_schedule_bootstrap};
