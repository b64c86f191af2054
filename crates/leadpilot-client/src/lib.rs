//! leadpilot-client: typed access to the LeadPilot REST API
//!
//! Wraps every `/api` route the dashboard uses, plus the capture flow that
//! captures a lead, personalizes it and archives the email draft in one go.

pub mod capture;
pub mod client;
pub mod error;

pub use capture::{CaptureForm, CaptureOutcome};
pub use client::DashboardClient;
pub use error::{ClientError, Result};
