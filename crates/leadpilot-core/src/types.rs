//! Shared request/response types for leadpilot-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use leadpilot_store::Lead;

/// The subset of a lead the personalization prompts are built from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadProfile {
    pub name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
}

impl From<&Lead> for LeadProfile {
    fn from(lead: &Lead) -> Self {
        Self {
            name: Some(lead.name.clone()),
            company: lead.company.clone(),
            job_title: lead.job_title.clone(),
            location: lead.location.clone(),
            industry: lead.industry.clone(),
            company_size: lead.company_size.clone(),
        }
    }
}

/// Subject + body pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// GPT (or mock) outreach copy for one lead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedMessages {
    pub sms: String,
    pub email: EmailDraft,
    pub linkedin: String,
    pub context_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizationResult {
    pub lead_id: i64,
    pub lead_name: String,
    pub messages: PersonalizedMessages,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPersonalization {
    pub total: usize,
    pub results: Vec<PersonalizationResult>,
}

/// Body of `POST /api/leads/capture`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Body of `POST /api/leads/{id}/sms/send`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendSmsRequest {
    #[serde(default)]
    pub regenerate: bool,
    /// Explicit text; when absent the copy is (re)generated
    #[serde(default, alias = "override_text")]
    pub body: Option<String>,
}

/// Body of `POST /api/leads/{id}/email/send` and `/email/compose`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailRequest {
    #[serde(default = "default_true")]
    pub regenerate: bool,
    #[serde(default, alias = "override_subject")]
    pub subject: Option<String>,
    #[serde(default, alias = "override_body")]
    pub body: Option<String>,
}

impl Default for SendEmailRequest {
    fn default() -> Self {
        Self {
            regenerate: true,
            subject: None,
            body: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Body of `POST /api/leads/{id}/notes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNoteRequest {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

/// Body of `POST /api/leads/{id}/followups/ingest`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsReceipt {
    pub sid: String,
    pub status: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub transport: String,
    pub sid: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eml_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSendResult {
    pub sent: bool,
    pub provider: SmsReceipt,
    pub message_id: i64,
    pub sms: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSendResult {
    pub sent: bool,
    pub provider: EmailReceipt,
    pub message_id: i64,
    pub subject: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeResult {
    pub ok: bool,
    pub compose_path: String,
    pub subject: String,
}

/// Outcome of an inbound webhook that was matched to a lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundResult {
    pub ok: bool,
    pub stored_message_id: i64,
    pub matched_lead_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub ok: bool,
    pub lead_id: i64,
    pub stored_bytes: usize,
}

/// What the autopilot proposes doing next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Sms,
    Email,
    CallScript,
    Task,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub action: ActionKind,
    /// Relative slot such as `now`, `in_2h`, `tomorrow_2pm`
    pub when: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowupState {
    pub intent: String,
    pub objections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopilotPlan {
    pub lead_id: i64,
    pub reasoning: String,
    pub state: FollowupState,
    pub plan: Vec<PlannedAction>,
    pub used_context: String,
}
