//! AI personalization of outreach copy
//!
//! Generates an SMS, an email and a LinkedIn note for a lead. With a provider
//! configured the three prompts run concurrently; without one (or when the
//! provider fails) a deterministic template is used so the rest of the
//! pipeline keeps working offline.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::branding::Branding;
use crate::providers::{CompletionRequest, LlmProvider};
use crate::types::{EmailDraft, LeadProfile, PersonalizedMessages};

const DEFAULT_SUBJECT: &str = "Regarding your insurance coverage";

pub struct PersonalizationService {
    provider: Option<Arc<dyn LlmProvider>>,
    branding: Branding,
}

impl PersonalizationService {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, branding: Branding) -> Self {
        match &provider {
            Some(p) => info!(
                "Personalization mode: {} (model={})",
                p.provider_name(),
                p.model()
            ),
            None => info!("Personalization mode: MOCK"),
        }
        Self { provider, branding }
    }

    /// Template-only service, no LLM calls
    pub fn mock(branding: Branding) -> Self {
        Self::new(None, branding)
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    pub fn is_live(&self) -> bool {
        self.provider.is_some()
    }

    /// Generate SMS, email and LinkedIn copy. Never fails: provider errors fall back to the template.
    pub async fn generate(&self, profile: &LeadProfile) -> PersonalizedMessages {
        let Some(provider) = &self.provider else {
            return mock_messages(profile, &self.branding);
        };

        let context = build_context(profile);
        match self.generate_live(provider.as_ref(), &context).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Personalization provider failed, using template: {:#}", e);
                mock_messages(profile, &self.branding)
            }
        }
    }

    async fn generate_live(
        &self,
        provider: &dyn LlmProvider,
        context: &str,
    ) -> Result<PersonalizedMessages> {
        let sms_req = CompletionRequest::new(sms_prompt(context)).with_max_tokens(120);
        let email_req = CompletionRequest::new(email_prompt(context, &self.branding));
        let linkedin_req = CompletionRequest::new(linkedin_prompt(context)).with_max_tokens(120);

        let (sms, raw_email, linkedin) = tokio::try_join!(
            provider.complete(&sms_req),
            provider.complete(&email_req),
            provider.complete(&linkedin_req),
        )?;

        let parsed = parse_subject_body(&raw_email);
        let subject = if parsed.subject.is_empty() {
            DEFAULT_SUBJECT.to_string()
        } else {
            parsed.subject
        };
        let body = ensure_link_and_signature(&parsed.body, &self.branding);
        debug!("Generated live copy ({} char email)", body.len());

        Ok(PersonalizedMessages {
            sms,
            email: EmailDraft { subject, body },
            linkedin,
            context_used: context.to_string(),
        })
    }
}

/// `Name: … | Company: … | Title: …` from whichever fields are present
pub fn build_context(profile: &LeadProfile) -> String {
    let fields = [
        ("Name", &profile.name),
        ("Company", &profile.company),
        ("Title", &profile.job_title),
        ("Location", &profile.location),
        ("Industry", &profile.industry),
        ("Company Size", &profile.company_size),
    ];
    fields
        .iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn first_name(full: Option<&str>) -> String {
    full.and_then(|n| n.split_whitespace().next())
        .unwrap_or("there")
        .to_string()
}

/// Split a `SUBJECT: …` / `BODY:` formatted model reply
pub fn parse_subject_body(raw: &str) -> EmailDraft {
    let mut subject = String::new();
    let mut body_lines = Vec::new();
    let mut in_body = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SUBJECT:") {
            subject = rest.trim().to_string();
        } else if trimmed.starts_with("BODY:") {
            in_body = true;
        } else if in_body {
            body_lines.push(line);
        }
    }

    EmailDraft {
        subject: subject.trim().to_string(),
        body: body_lines.join("\n").trim().to_string(),
    }
}

/// Append the booking link and signature when the model left them out
pub fn ensure_link_and_signature(body: &str, branding: &Branding) -> String {
    let mut out = body.trim().to_string();
    if let Some(url) = branding.booking_url() {
        if !out.contains(url) {
            out.push_str(&format!("\n\n{url}\n"));
        }
    }
    if !out.contains(&branding.sender_name) || !out.contains(&branding.sender_company) {
        out.push_str(&branding.signature_block());
        out.push('\n');
    }
    out
}

pub fn mock_messages(profile: &LeadProfile, branding: &Branding) -> PersonalizedMessages {
    let name = first_name(profile.name.as_deref());
    let company = profile.company.as_deref().unwrap_or("your company");
    let title = profile.job_title.as_deref().unwrap_or("your role");

    let sms = format!(
        "Hi {name}! Quick question about {company}'s coverage. Worth a quick chat this week?"
    );

    let mut body = format!(
        "Hi {name},\n\nI noticed you're {title} at {company}. I specialize in helping teams like \
         yours optimize insurance coverage and reduce costs.\n\n"
    );
    if let Some(url) = branding.booking_url() {
        body.push_str(url);
        body.push('\n');
    }
    body.push_str(branding.signature_block().trim_start_matches('\n'));
    body.push('\n');

    let linkedin = format!(
        "Hi {name}, impressed by the work at {company}. I help {title}s optimize insurance. \
         Would love to connect!"
    );

    PersonalizedMessages {
        sms,
        email: EmailDraft {
            subject: format!("Insurance review for {company}"),
            body,
        },
        linkedin,
        context_used: build_context(profile),
    }
}

fn sms_prompt(context: &str) -> String {
    format!(
        "You are an expert insurance SDR writing a personalized SMS.\n\n\
         Lead Info:\n{context}\n\n\
         Write one short, friendly SMS (160 characters or fewer) that:\n\
         - uses the lead's first name\n\
         - references their role or company naturally\n\
         - offers one concrete benefit (coverage review or savings)\n\
         - ends with a simple call to book a quick call\n\n\
         Return ONLY the SMS text."
    )
}

fn email_prompt(context: &str, branding: &Branding) -> String {
    let link_rule = match branding.booking_url() {
        Some(url) => format!("- include this booking link exactly once on its own line: {url}\n"),
        None => String::new(),
    };
    format!(
        "You are an expert insurance sales representative writing a personalized email.\n\n\
         Lead Information:\n{context}\n\n\
         Write a professional email that:\n\
         - has a compelling subject line (max 50 characters)\n\
         - opens with their name and company and shows you researched their role\n\
         - explains specific value for their situation with a clear call to action\n\
         {link_rule}\
         - is 150-200 words and sounds human\n\
         - ends with this exact signature block:{signature}\n\n\
         Format your response EXACTLY like this:\n\
         SUBJECT: [subject line]\n\n\
         BODY:\n\
         [email body]",
        signature = branding.signature_block(),
    )
}

fn linkedin_prompt(context: &str) -> String {
    format!(
        "Write a short LinkedIn connection note (200 characters or fewer).\n\n\
         Lead Info:\n{context}\n\n\
         Reference their company or role naturally, keep it friendly and value-oriented.\n\
         Return ONLY the note text."
    )
}
