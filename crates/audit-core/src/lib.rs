//! Shared model, configuration and error types for crash log auditing.
//!
//! Everything here is free of I/O except the eager existence checks done
//! while validating command-line settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{AuditError, Result};
