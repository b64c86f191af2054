//! leadpilot-gateway: REST API for the LeadPilot dashboard
//!
//! Exposes lead capture, personalization, SMS/email sending, follow-up
//! autopilot and retention previews over HTTP, plus the inbound Twilio and
//! email webhooks.

pub mod auth;
pub mod error;
pub mod extract;
pub mod server;

pub use server::{GatewayServer, GatewayState, router};
