//! Shared configuration, constants, and error types for the Fieldline
//! platform core.

pub mod config;
pub mod constants;
pub mod error;
