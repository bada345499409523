//! Data layer for the crash audit.
//!
//! Reads collector logs (plain or gzip), reconciles receive and save events
//! over a time window, builds the report, and verifies crash ids against the
//! crash store.

pub mod analysis;
pub mod parser;
pub mod reader;
pub mod reconciler;
pub mod report;
pub mod verify;

pub use audit_core as core;
