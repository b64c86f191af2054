//! Outreach orchestration: every dashboard operation goes through here
//!
//! `OutreachService` ties the lead store to personalization, the SMS and
//! email transports, the `.eml` outbox, the follow-up context store and the
//! LLM agent. HTTP handlers and the CLI are thin wrappers around it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use leadpilot_store::{Channel, Lead, LeadStore, Message, MessageStatus, NewLead, NewMessage};

use crate::agent::{AgentRun, AgentSettings, FollowupAgent};
use crate::branding::Branding;
use crate::context::FollowupContextStore;
use crate::enrichment::{self, EnrichmentMode};
use crate::error::{OutreachError, Result};
use crate::personalization::PersonalizationService;
use crate::planner::{self, THREAD_CONTEXT_LIMIT};
use crate::retention::{self, RetentionPreview, RetentionRequest};
use crate::transport::{
    ConsoleEmail, DryRunSms, EmailTransport, OutgoingEmail, Outbox, SmsTransport,
    append_booking_link,
};
use crate::types::{
    AddNoteRequest, AutopilotPlan, BatchPersonalization, CaptureRequest, ComposeResult,
    EmailDraft, EmailSendResult, InboundResult, IngestResult, LeadProfile, PersonalizationResult,
    SendEmailRequest, SendSmsRequest, SmsSendResult,
};

/// Phone stored when the capture form leaves it blank
pub const DEFAULT_PHONE: &str = "+15550000000";

/// Upper bound on ids handled by one batch personalization call
pub const MAX_BATCH: usize = 10;

pub struct OutreachService {
    store: LeadStore,
    personalization: PersonalizationService,
    sms: Arc<dyn SmsTransport>,
    email: Arc<dyn EmailTransport>,
    outbox: Outbox,
    contexts: FollowupContextStore,
    agent: FollowupAgent,
    enrichment: EnrichmentMode,
}

impl OutreachService {
    pub fn new(
        store: LeadStore,
        personalization: PersonalizationService,
        sms: Arc<dyn SmsTransport>,
        email: Arc<dyn EmailTransport>,
        outbox: Outbox,
    ) -> Self {
        info!(
            "Outreach service ready (sms={}, email={}, outbox={})",
            sms.name(),
            email.name(),
            outbox.dir().display()
        );
        Self {
            store,
            personalization,
            sms,
            email,
            outbox,
            contexts: FollowupContextStore::new(),
            agent: FollowupAgent::new(None, AgentSettings::default()),
            enrichment: EnrichmentMode::default(),
        }
    }

    /// Template copy, dry-run SMS and console email
    pub fn offline(store: LeadStore, outbox_dir: impl Into<PathBuf>, branding: Branding) -> Self {
        let outbox = Outbox::new(outbox_dir, &branding);
        let email = Arc::new(ConsoleEmail::new(outbox.clone()));
        Self::new(
            store,
            PersonalizationService::mock(branding),
            Arc::new(DryRunSms),
            email,
            outbox,
        )
    }

    pub fn with_enrichment(mut self, mode: EnrichmentMode) -> Self {
        self.enrichment = mode;
        self
    }

    pub fn with_agent(mut self, agent: FollowupAgent) -> Self {
        self.agent = agent;
        self
    }

    pub fn branding(&self) -> &Branding {
        self.personalization.branding()
    }

    pub fn store(&self) -> &LeadStore {
        &self.store
    }

    // ── Leads ──

    pub async fn list_leads(&self) -> Result<Vec<Lead>> {
        Ok(self.store.list_leads().await?)
    }

    pub async fn get_lead(&self, id: i64) -> Result<Lead> {
        self.store
            .get_lead(id)
            .await?
            .ok_or_else(OutreachError::lead_not_found)
    }

    /// Store a new lead, enriched according to the configured mode
    pub async fn capture(&self, request: CaptureRequest) -> Result<Lead> {
        let name = request.name.trim();
        let email = request.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(OutreachError::Validation(
                "name and email are required".to_string(),
            ));
        }
        if self.store.find_lead_by_email(email).await?.is_some() {
            return Err(OutreachError::DuplicateEmail(email.to_string()));
        }

        let phone = request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PHONE);

        let mut new_lead = NewLead {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            ..Default::default()
        };
        enrichment::enrich(self.enrichment, &mut new_lead);

        let lead = self.store.insert_lead(new_lead).await?;
        info!("Captured lead {} <{}>", lead.id, lead.email);
        Ok(lead)
    }

    pub async fn thread(&self, lead_id: i64) -> Result<Vec<Message>> {
        Ok(self.store.thread(lead_id).await?)
    }

    // ── Personalization ──

    pub async fn personalize(&self, lead_id: i64) -> Result<PersonalizationResult> {
        let lead = self.get_lead(lead_id).await?;
        Ok(self.personalize_lead(&lead).await)
    }

    /// Personalize up to `MAX_BATCH` leads; unknown ids are skipped
    pub async fn personalize_batch(&self, lead_ids: &[i64]) -> Result<BatchPersonalization> {
        let mut results = Vec::new();
        for &id in lead_ids.iter().take(MAX_BATCH) {
            match self.store.get_lead(id).await? {
                Some(lead) => results.push(self.personalize_lead(&lead).await),
                None => debug!("Batch personalize: lead {} not found, skipping", id),
            }
        }
        Ok(BatchPersonalization {
            total: results.len(),
            results,
        })
    }

    async fn personalize_lead(&self, lead: &Lead) -> PersonalizationResult {
        let messages = self.personalization.generate(&LeadProfile::from(lead)).await;
        PersonalizationResult {
            lead_id: lead.id,
            lead_name: lead.name.clone(),
            messages,
            generated_at: Utc::now(),
        }
    }

    /// Generated email with the booking link guaranteed
    async fn email_draft(&self, lead: &Lead) -> EmailDraft {
        let generated = self.personalization.generate(&LeadProfile::from(lead)).await;
        EmailDraft {
            body: append_booking_link(&generated.email.body, self.branding().booking_url()),
            subject: generated.email.subject,
        }
    }

    // ── Outbound ──

    pub async fn send_sms(&self, lead_id: i64, request: SendSmsRequest) -> Result<SmsSendResult> {
        let lead = self.get_lead(lead_id).await?;
        let text = match request.body.filter(|b| !b.trim().is_empty()) {
            Some(text) => text,
            None => {
                self.personalization
                    .generate(&LeadProfile::from(&lead))
                    .await
                    .sms
            }
        };
        let to = if lead.phone.is_empty() {
            DEFAULT_PHONE
        } else {
            lead.phone.as_str()
        };

        let receipt = match self.sms.send(to, &text).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("SMS to lead {} failed: {:#}", lead_id, e);
                self.store
                    .insert_message(
                        NewMessage::outbound(lead_id, Channel::Sms, text)
                            .with_status(MessageStatus::Failed),
                    )
                    .await?;
                return Err(OutreachError::Delivery(e));
            }
        };

        let stored = self
            .store
            .insert_message(
                NewMessage::outbound(lead_id, Channel::Sms, text.clone())
                    .with_provider_sid(receipt.sid.clone())
                    .with_status(receipt.status.parse().unwrap_or(MessageStatus::Queued)),
            )
            .await?;

        Ok(SmsSendResult {
            sent: true,
            provider: receipt,
            message_id: stored.id,
            sms: text,
        })
    }

    pub async fn send_email(
        &self,
        lead_id: i64,
        request: SendEmailRequest,
    ) -> Result<EmailSendResult> {
        let lead = self.get_lead(lead_id).await?;
        let subject = request.subject.filter(|s| !s.trim().is_empty());
        let body = request.body.filter(|b| !b.trim().is_empty());

        let draft = match (subject, body) {
            (Some(subject), Some(body)) if !request.regenerate => EmailDraft {
                subject,
                body: append_booking_link(&body, self.branding().booking_url()),
            },
            (subject, body) => {
                let generated = self.email_draft(&lead).await;
                EmailDraft {
                    subject: subject.unwrap_or(generated.subject),
                    body: match body {
                        Some(b) => append_booking_link(&b, self.branding().booking_url()),
                        None => generated.body,
                    },
                }
            }
        };

        let outgoing = OutgoingEmail {
            to_name: lead.name.clone(),
            to_email: lead.email.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
        };
        let message = NewMessage::outbound(lead_id, Channel::Email, draft.body)
            .with_subject(draft.subject.clone());

        let receipt = match self.email.send(&outgoing).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Email to lead {} failed: {:#}", lead_id, e);
                self.store
                    .insert_message(message.with_status(MessageStatus::Failed))
                    .await?;
                return Err(OutreachError::Delivery(e));
            }
        };

        let stored = self
            .store
            .insert_message(
                message
                    .with_provider_sid(receipt.sid.clone())
                    .with_status(receipt.status.parse().unwrap_or(MessageStatus::Queued)),
            )
            .await?;

        Ok(EmailSendResult {
            sent: true,
            provider: receipt,
            message_id: stored.id,
            subject: draft.subject,
            to: lead.email,
        })
    }

    /// Write a ready-to-open `.eml` without sending or recording it
    pub async fn compose_email(&self, lead_id: i64) -> Result<ComposeResult> {
        let lead = self.get_lead(lead_id).await?;
        let draft = self.email_draft(&lead).await;
        let path = self
            .outbox
            .write(&OutgoingEmail {
                to_name: lead.name,
                to_email: lead.email,
                subject: draft.subject.clone(),
                body: draft.body,
            })
            .await?;

        Ok(ComposeResult {
            ok: true,
            compose_path: path.display().to_string(),
            subject: draft.subject,
        })
    }

    pub async fn add_note(&self, lead_id: i64, request: AddNoteRequest) -> Result<Message> {
        if request.body.trim().is_empty() {
            return Err(OutreachError::Validation("body_required".to_string()));
        }
        self.get_lead(lead_id).await?;

        let mut note = NewMessage::outbound(lead_id, Channel::Note, request.body)
            .with_status(MessageStatus::Sent);
        if let Some(subject) = request.subject.filter(|s| !s.trim().is_empty()) {
            note = note.with_subject(subject);
        }
        Ok(self.store.insert_message(note).await?)
    }

    // ── Inbound ──

    /// Twilio-style inbound SMS, matched to a lead by phone
    pub async fn record_inbound_sms(&self, from: &str, body: &str) -> Result<InboundResult> {
        let from = from.trim();
        if from.is_empty() {
            return Err(OutreachError::Validation("From required".to_string()));
        }
        let lead = self
            .store
            .find_lead_by_phone(from)
            .await?
            .ok_or_else(|| OutreachError::NotFound("No lead matched by phone".to_string()))?;

        let stored = self
            .store
            .insert_message(NewMessage::inbound(lead.id, Channel::Sms, body))
            .await?;
        info!("Inbound SMS from {} stored for lead {}", from, lead.id);
        Ok(InboundResult {
            ok: true,
            stored_message_id: stored.id,
            matched_lead_id: lead.id,
        })
    }

    /// Inbound email webhook, matched to a lead by sender address
    pub async fn record_inbound_email(
        &self,
        from: &str,
        subject: &str,
        text: &str,
    ) -> Result<InboundResult> {
        let from = from.trim();
        if from.is_empty() {
            return Err(OutreachError::Validation("From required".to_string()));
        }
        let lead = self
            .store
            .find_lead_by_email(from)
            .await?
            .ok_or_else(|| OutreachError::NotFound("No lead matched by email".to_string()))?;

        let stored = self
            .store
            .insert_message(NewMessage::inbound(lead.id, Channel::Email, text).with_subject(subject))
            .await?;
        info!("Inbound email from {} stored for lead {}", from, lead.id);
        Ok(InboundResult {
            ok: true,
            stored_message_id: stored.id,
            matched_lead_id: lead.id,
        })
    }

    // ── Follow-ups ──

    /// Remember pasted context for the autopilot and log it to the thread
    pub async fn ingest_context(&self, lead_id: i64, text: Option<&str>) -> Result<IngestResult> {
        let text = text.map(str::trim).unwrap_or("");
        if text.is_empty() {
            return Err(OutreachError::Validation("text_required".to_string()));
        }
        self.get_lead(lead_id).await?;

        let stored_bytes = self.contexts.put(lead_id, text).await;
        self.store
            .insert_message(NewMessage::inbound(
                lead_id,
                Channel::Note,
                format!("[INGESTED CONTEXT]\n{text}"),
            ))
            .await?;

        Ok(IngestResult {
            ok: true,
            lead_id,
            stored_bytes,
        })
    }

    /// Draft next-best actions and save the SMS and email as drafts
    pub async fn run_autopilot(&self, lead_id: i64) -> Result<AutopilotPlan> {
        let lead = self.get_lead(lead_id).await?;

        let ingested = self.contexts.get(lead_id).await;
        let recent = if ingested.is_none() {
            self.store.recent_thread(lead_id, THREAD_CONTEXT_LIMIT).await?
        } else {
            Vec::new()
        };
        let context = planner::resolve_context(ingested, &recent);

        let drafts = self.personalization.generate(&LeadProfile::from(&lead)).await;
        let booking_url = self.branding().booking_url();
        let email_body = append_booking_link(&drafts.email.body, booking_url);
        let plan = planner::build_plan(lead_id, context, &drafts, &email_body, booking_url);

        self.store
            .insert_messages(vec![
                NewMessage::outbound(lead_id, Channel::Sms, drafts.sms.clone())
                    .with_status(MessageStatus::Draft),
                NewMessage::outbound(lead_id, Channel::Email, email_body)
                    .with_subject(drafts.email.subject.clone())
                    .with_status(MessageStatus::Draft),
            ])
            .await?;

        info!(
            "Autopilot for lead {}: intent={}, objections={:?}",
            lead_id, plan.state.intent, plan.state.objections
        );
        Ok(plan)
    }

    /// Let the LLM agent analyze the thread and send follow-ups
    pub async fn run_agent(&self, lead_id: i64) -> Result<AgentRun> {
        let lead = self.get_lead(lead_id).await?;
        let events = self.store.thread(lead_id).await?;
        self.agent.run(self, &lead, &events).await
    }

    // ── Retention ──

    pub fn retention_preview(&self, request: &RetentionRequest) -> Result<RetentionPreview> {
        let branding = self.branding();
        retention::preview(
            request,
            branding.booking_url(),
            &branding.sender_name,
            &branding.sender_company,
        )
    }
}
