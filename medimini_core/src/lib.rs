#![forbid(unsafe_code)]

//! Core domain model and business logic for MediMini.
//!
//! This crate provides:
//! - Domain types (medications, rules, conflicts, suggestions, change log)
//! - ISO-8601 time handling
//! - Conflict detection and rescheduling suggestions
//! - Persistence (locked JSON document store, CSV export)

pub mod types;
pub mod error;
pub mod time;
pub mod config;
pub mod logging;
pub mod detect;
pub mod suggest;
pub mod medications;
pub mod store;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use time::Timestamp;
pub use config::Config;
pub use detect::detect_conflicts;
pub use suggest::{
    apply_and_persist, apply_numbered, apply_suggestion, generate_suggestion, generate_suggestions,
    suggest_for,
};
pub use medications::{add_medication, delete_medication, medications_for_user, NewMedication};
pub use store::{JsonFileStore, Store};
pub use export::export_change_log_csv;
