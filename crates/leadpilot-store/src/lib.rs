//! Persistence layer for LeadPilot
//!
//! This crate provides:
//! - SQLite storage for captured leads and their enrichment fields
//! - Per-lead message threads (SMS, email, internal notes)

pub mod error;
pub mod models;
pub mod sqlite;

pub use error::StoreError;
pub use models::{
    Channel, Direction, EnrichmentState, Lead, Message, MessageStatus, NewLead, NewMessage,
};
pub use sqlite::LeadStore;
