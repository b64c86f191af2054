//! Capture form and the client-side tailoring applied to generated copy

use leadpilot_core::{EmailDraft, PersonalizedMessages};
use leadpilot_store::Lead;
use serde::{Deserialize, Serialize};

const DEFAULT_SUBJECT: &str = "Regarding your insurance coverage";
const DEFAULT_BODY: &str = "Hello,\n\nQuick chat?\n";
const COMPANY_PLACEHOLDER: &str = "your company";

/// Everything the capture screen collects. Only name/email/phone reach the
/// API; the rest is folded into the generated copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    /// Marriage, new home, new car...
    pub life_stage: Option<String>,
    pub insurer: Option<String>,
    pub renewal_date: Option<String>,
    pub pain_points: Option<String>,
    /// Ad, referral, website...
    pub source: Option<String>,
}

impl CaptureForm {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    /// `\n---\nContext we considered:\n• ...` for the non-blank extras, or
    /// an empty string when there are none
    pub fn extras_block(&self) -> String {
        let fields = [
            ("Life stage", &self.life_stage),
            ("Current insurer", &self.insurer),
            ("Renewal date", &self.renewal_date),
            ("Pain points", &self.pain_points),
            ("Lead source", &self.source),
            ("Company", &self.company),
            ("Title", &self.title),
            ("Location", &self.location),
        ];
        let lines: Vec<String> = fields
            .iter()
            .filter_map(|(label, value)| {
                non_blank(value).map(|v| format!("• {label}: {v}"))
            })
            .collect();
        if lines.is_empty() {
            return String::new();
        }
        format!("\n---\nContext we considered:\n{}", lines.join("\n"))
    }

    fn company(&self) -> Option<&str> {
        non_blank(&self.company)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Result of the one-shot capture flow
#[derive(Debug, Clone, Serialize)]
pub struct CaptureOutcome {
    pub lead: Lead,
    pub messages: PersonalizedMessages,
    /// Whether the email draft was saved through `email/send`
    pub archived: bool,
}

/// Merge the form extras and booking link into freshly generated copy.
pub fn tailor_messages(
    generated: PersonalizedMessages,
    form: &CaptureForm,
    booking_url: Option<&str>,
) -> PersonalizedMessages {
    let extras = form.extras_block();

    let subject = if generated.email.subject.is_empty() {
        DEFAULT_SUBJECT.to_string()
    } else {
        generated.email.subject
    };
    let mut body = if generated.email.body.is_empty() {
        DEFAULT_BODY.to_string()
    } else {
        generated.email.body
    };
    if let Some(url) = booking_url.filter(|u| !u.is_empty()) {
        if !body.contains(url) {
            body.push_str(&format!("\n\n{url}\n"));
        }
    }
    body.push_str(&extras);

    let sms = generated
        .sms
        .replacen(COMPANY_PLACEHOLDER, form.company().unwrap_or(COMPANY_PLACEHOLDER), 1);

    let mut context_used = generated.context_used;
    if !extras.is_empty() {
        context_used.push(' ');
        context_used.push_str(&extras.replacen("\n---\n", " | ", 1));
    }

    PersonalizedMessages {
        sms,
        email: EmailDraft { subject, body },
        linkedin: generated.linkedin,
        context_used,
    }
}
