//! LLM follow-up agent: analyze a lead's history, then act on the plan
//!
//! `analyze` asks the model for a JSON plan (situation summary, stage,
//! objections, two SMS and one email). `act` sends those messages through
//! the service and leaves an escalation note when pricing pushback shows up.
//! Runs are throttled per lead.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use leadpilot_store::{Lead, Message};

use crate::error::Result;
use crate::providers::{CompletionRequest, LlmProvider};
use crate::service::OutreachService;
use crate::transport::append_booking_link;
use crate::types::{AddNoteRequest, SendEmailRequest, SendSmsRequest};

const DEFAULT_SUBJECT: &str = "Follow-up on coverage & quick booking";

/// How many thread entries go into the analysis prompt
const HISTORY_LIMIT: usize = 15;

const SYSTEM_PROMPT: &str = "You are a follow-up copilot for insurance sales. \
    Given messy multi-touch history (calls, texts, emails, notes), return a compact JSON plan \
    with: summary, stage, intent_signal, objections[], recommended_actions[], and 3 messages \
    (sms_1, sms_2, email) in the prospect's tone. Prefer concise, human-sounding copy. \
    Keep SMS under 300 chars; email 120-180 words.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub enabled: bool,
    pub min_interval_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendedAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    pub when: String,
}

/// The model's analysis of a lead
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPlan {
    pub summary: String,
    pub stage: String,
    pub intent_signal: String,
    pub objections: Vec<String>,
    pub recommended_actions: Vec<RecommendedAction>,
    pub sms_1: String,
    pub sms_2: String,
    pub email: String,
}

impl AgentPlan {
    /// Used when the model is unavailable or returns something unparseable
    pub fn fallback(booking_url: Option<&str>) -> Self {
        let booking = booking_url
            .map(|url| format!("\n\nBook a time:\n{url}\n"))
            .unwrap_or_default();
        Self {
            summary: "Light interest; pricing concern. Recommend quick nudge + ROI email."
                .to_string(),
            stage: "evaluating".to_string(),
            intent_signal: "asked pricing last call".to_string(),
            objections: vec!["too expensive".to_string()],
            recommended_actions: vec![
                RecommendedAction {
                    kind: "sms".to_string(),
                    title: "Nudge".to_string(),
                    body: "Can price a lighter plan for apples-to-apples. Want me to send it?"
                        .to_string(),
                    when: "now".to_string(),
                },
                RecommendedAction {
                    kind: "email".to_string(),
                    title: "ROI example".to_string(),
                    body: "Send ROI proof + booking link".to_string(),
                    when: "now".to_string(),
                },
            ],
            sms_1: "Quick one: I can quote a lighter plan to compare apples-to-apples. \
                    Want me to send it?"
                .to_string(),
            sms_2: "We just cut a similar team's premium 14% without losing coverage. \
                    Want a side-by-side?"
                .to_string(),
            email: format!("Subject: Quick path to savings\n\nHi there,{booking}"),
        }
    }

    pub fn has_pricing_objection(&self) -> bool {
        self.objections.iter().any(|o| {
            let o = o.to_lowercase();
            o.contains("expensive") || o.contains("budget") || o.contains("price")
        })
    }

    /// Split a leading `Subject:` line off the email text
    pub fn email_parts(&self) -> (String, String) {
        let email = self.email.trim();
        let has_subject = email
            .get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("subject:"));
        if !has_subject {
            return (DEFAULT_SUBJECT.to_string(), email.to_string());
        }

        let lines: Vec<&str> = email.lines().collect();
        let subject = lines[0].get(8..).unwrap_or("").trim();
        let subject = if subject.is_empty() {
            DEFAULT_SUBJECT.to_string()
        } else {
            subject.to_string()
        };
        let body = if lines.len() > 2 {
            lines[2..].join("\n").trim().to_string()
        } else {
            String::new()
        };
        (subject, body)
    }
}

/// Outcome of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentRun {
    Disabled,
    Throttled {
        last_run: DateTime<Utc>,
    },
    Executed {
        plan: AgentPlan,
        /// Ids of the messages and notes written while acting
        message_ids: Vec<i64>,
    },
}

pub struct FollowupAgent {
    provider: Option<Arc<dyn LlmProvider>>,
    settings: AgentSettings,
    last_run: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl FollowupAgent {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, settings: AgentSettings) -> Self {
        Self {
            provider,
            settings,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> AgentSettings {
        self.settings
    }

    /// Analyze and act, unless disabled or the lead ran too recently
    pub async fn run(
        &self,
        service: &OutreachService,
        lead: &Lead,
        events: &[Message],
    ) -> Result<AgentRun> {
        if !self.settings.enabled {
            return Ok(AgentRun::Disabled);
        }

        let now = Utc::now();
        let previous = {
            let mut last_run = self.last_run.lock().await;
            let previous = last_run.get(&lead.id).copied();
            if let Some(last) = previous {
                if now - last < Duration::seconds(self.settings.min_interval_secs as i64) {
                    debug!("Agent throttled for lead {} (last run {})", lead.id, last);
                    return Ok(AgentRun::Throttled { last_run: last });
                }
            }
            // reserve the slot so concurrent calls for the same lead throttle
            last_run.insert(lead.id, now);
            previous
        };

        let booking_url = service.branding().booking_url().map(str::to_string);
        let plan = self.analyze(lead, events, booking_url.as_deref()).await;
        match self.act(service, lead.id, &plan, booking_url.as_deref()).await {
            Ok(message_ids) => {
                info!(
                    "Agent executed for lead {}: stage={}, {} messages",
                    lead.id,
                    plan.stage,
                    message_ids.len()
                );
                Ok(AgentRun::Executed { plan, message_ids })
            }
            Err(e) => {
                let mut last_run = self.last_run.lock().await;
                match previous {
                    Some(t) => last_run.insert(lead.id, t),
                    None => last_run.remove(&lead.id),
                };
                Err(e)
            }
        }
    }

    pub async fn analyze(
        &self,
        lead: &Lead,
        events: &[Message],
        booking_url: Option<&str>,
    ) -> AgentPlan {
        let Some(provider) = &self.provider else {
            return AgentPlan::fallback(booking_url);
        };

        let request = CompletionRequest::new(analysis_prompt(lead, events, booking_url))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.4)
            .with_max_tokens(900)
            .json();

        match provider.complete(&request).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Agent plan was not valid JSON ({}), using fallback", e);
                AgentPlan::fallback(booking_url)
            }),
            Err(e) => {
                warn!("Agent analysis failed, using fallback: {:#}", e);
                AgentPlan::fallback(booking_url)
            }
        }
    }

    /// SMS 1, email, SMS 2, then an escalation note on pricing pushback
    pub async fn act(
        &self,
        service: &OutreachService,
        lead_id: i64,
        plan: &AgentPlan,
        booking_url: Option<&str>,
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::new();

        if !plan.sms_1.trim().is_empty() {
            ids.push(service.send_sms(lead_id, sms_override(&plan.sms_1)).await?.message_id);
        }

        let (subject, body) = plan.email_parts();
        let body = append_booking_link(&body, booking_url);
        let email = SendEmailRequest {
            regenerate: false,
            subject: Some(subject),
            body: Some(body),
        };
        ids.push(service.send_email(lead_id, email).await?.message_id);

        if !plan.sms_2.trim().is_empty() {
            ids.push(service.send_sms(lead_id, sms_override(&plan.sms_2)).await?.message_id);
        }

        if plan.has_pricing_objection() {
            let note = AddNoteRequest {
                subject: Some("escalate_to_human".to_string()),
                body: escalation_brief(plan, booking_url),
            };
            ids.push(service.add_note(lead_id, note).await?.id);
            info!("Escalated lead {} to a human (pricing resistance)", lead_id);
        }

        Ok(ids)
    }
}

fn sms_override(text: &str) -> SendSmsRequest {
    SendSmsRequest {
        regenerate: false,
        body: Some(text.to_string()),
    }
}

fn escalation_brief(plan: &AgentPlan, booking_url: Option<&str>) -> String {
    let mut brief = format!(
        "ESCALATE: Pricing resistance.\n\nSUMMARY: {}\nSTAGE: {} | SIGNAL: {}\nSCRIPT:\n\
         - Acknowledge cost.\n\
         - Offer lighter plan quote.\n\
         - Share 1-liner ROI: 'Teams like yours saved ~12-18% keeping same coverage.'\n",
        plan.summary, plan.stage, plan.intent_signal
    );
    if let Some(url) = booking_url {
        brief.push_str(&format!("- Close with booking link: {url}\n"));
    }
    brief
}

fn analysis_prompt(lead: &Lead, events: &[Message], booking_url: Option<&str>) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    let who = format!(
        "{} ({} @ {})",
        lead.name,
        field(&lead.job_title),
        field(&lead.company)
    );

    let start = events.len().saturating_sub(HISTORY_LIMIT);
    let history = events[start..]
        .iter()
        .map(|e| {
            format!(
                "[{}] {} {}: {} {}",
                e.created_at.to_rfc3339(),
                e.channel.as_str().to_uppercase(),
                e.direction,
                e.subject.as_deref().unwrap_or(""),
                e.body
            )
            .trim()
            .to_string()
        })
        .collect::<Vec<_>>();
    let history = if history.is_empty() {
        "(no history)".to_string()
    } else {
        history.join("\n")
    };

    let link = booking_url
        .map(|url| format!(" (include this booking link once on its own line: {url})"))
        .unwrap_or_default();

    format!(
        "LEAD:\n\
         - {who}\n\
         - Location: {}\n\
         - Industry: {}\n\
         - Company size: {}\n\n\
         HISTORY (most recent last):\n{history}\n\n\
         TASK:\n\
         1) One-sentence situation summary.\n\
         2) Stage (one of: cold, curious, evaluating, ready_to_switch, closed_lost).\n\
         3) Intent signal (short phrase).\n\
         4) Objections: array of short strings.\n\
         5) Recommended_actions: array of objects with type (sms, email, call_script, task, wait), \
         title, body and when (now, after_2_days, ...).\n\
         6) Messages: sms_1 (concise, friendly), sms_2 (value/ROI angle), email{link}.\n\n\
         Return ONLY valid JSON with keys:\n\
         summary, stage, intent_signal, objections, recommended_actions, sms_1, sms_2, email",
        field(&lead.location),
        field(&lead.industry),
        field(&lead.company_size),
    )
}
