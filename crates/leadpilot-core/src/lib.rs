//! Core outreach logic for LeadPilot
//!
//! This crate provides:
//! - LLM-backed (or template) personalization of SMS, email and LinkedIn copy
//! - Capture-time enrichment
//! - SMS and email transports plus the `.eml` outbox
//! - The keyword autopilot planner and the LLM follow-up agent
//! - Retention presets
//! - `OutreachService`, which the gateway and CLI call into

pub mod agent;
pub mod branding;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod personalization;
pub mod planner;
pub mod providers;
pub mod retention;
pub mod service;
pub mod transport;
pub mod types;

pub use agent::{AgentPlan, AgentRun, AgentSettings, FollowupAgent};
pub use branding::Branding;
pub use enrichment::EnrichmentMode;
pub use error::OutreachError;
pub use personalization::PersonalizationService;
pub use providers::{CompletionRequest, LlmProvider, OpenAiProvider};
pub use retention::{RetentionCustomer, RetentionPreview, RetentionRequest};
pub use service::OutreachService;
pub use types::*;
