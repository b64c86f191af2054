//! HTTP client for the `/api` routes

use std::time::Duration;

use leadpilot_core::{
    AgentRun, AutopilotPlan, BatchPersonalization, CaptureRequest, ComposeResult,
    EmailSendResult, IngestResult, PersonalizationResult, RetentionPreview, RetentionRequest,
    SendEmailRequest, SendSmsRequest, SmsSendResult,
};
use leadpilot_store::{Lead, Message};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::capture::{CaptureForm, CaptureOutcome, tailor_messages};
use crate::error::{ClientError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct DashboardClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    booking_url: Option<String>,
}

impl DashboardClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8010`
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            booking_url: None,
        }
    }

    /// Booking link injected into captured email drafts
    pub fn with_booking_url(mut self, url: impl Into<String>) -> Self {
        self.booking_url = Some(url.into()).filter(|u: &String| !u.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.authorized(self.http.get(self.url(path)));
        decode(request.send().await?).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.authorized(self.http.post(self.url(path)).json(body));
        decode(request.send().await?).await
    }

    /// Root health payload; not under `/api`
    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self.http.get(format!("{}/", self.base_url)).send().await?;
        decode(response).await
    }

    // ── Leads ──

    pub async fn list_leads(&self) -> Result<Vec<Lead>> {
        self.get("/leads").await
    }

    pub async fn get_lead(&self, id: i64) -> Result<Lead> {
        self.get(&format!("/leads/{id}")).await
    }

    pub async fn thread(&self, id: i64) -> Result<Vec<Message>> {
        self.get(&format!("/leads/{id}/messages")).await
    }

    pub async fn capture(&self, request: &CaptureRequest) -> Result<Lead> {
        self.post("/leads/capture", request).await
    }

    pub async fn personalize(&self, id: i64) -> Result<PersonalizationResult> {
        self.post(&format!("/leads/{id}/personalize"), &serde_json::json!({}))
            .await
    }

    pub async fn personalize_batch(&self, ids: &[i64]) -> Result<BatchPersonalization> {
        self.post("/leads/personalize/batch", ids).await
    }

    /// Capture, personalize, tailor the copy with the form extras, then
    /// archive the email draft. Archiving is best-effort.
    pub async fn capture_and_personalize(&self, form: &CaptureForm) -> Result<CaptureOutcome> {
        if form.name.trim().is_empty() || form.email.trim().is_empty() {
            return Err(ClientError::Validation(
                "Name and email are required".to_string(),
            ));
        }

        let lead = self
            .capture(&CaptureRequest {
                name: form.name.trim().to_string(),
                email: form.email.trim().to_string(),
                phone: form
                    .phone
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            })
            .await?;
        debug!("Captured lead {} ({})", lead.id, lead.email);

        let generated = self.personalize(lead.id).await?;
        let messages = tailor_messages(generated.messages, form, self.booking_url.as_deref());

        let archived = match self
            .send_email(lead.id, &SendEmailRequest {
                regenerate: false,
                subject: None,
                body: None,
            })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not archive email draft for lead {}: {}", lead.id, e);
                false
            }
        };

        Ok(CaptureOutcome {
            lead,
            messages,
            archived,
        })
    }

    // ── Outbound ──

    /// Send `body` verbatim, or let the server generate the copy when `None`
    pub async fn send_sms(&self, id: i64, body: Option<&str>) -> Result<SmsSendResult> {
        let body = body.map(str::trim).filter(|b| !b.is_empty());
        let request = SendSmsRequest {
            regenerate: body.is_none(),
            body: body.map(str::to_string),
        };
        self.post(&format!("/leads/{id}/sms/send"), &request).await
    }

    pub async fn send_email(&self, id: i64, request: &SendEmailRequest) -> Result<EmailSendResult> {
        self.post(&format!("/leads/{id}/email/send"), request).await
    }

    /// Send with explicit copy; regenerates unless both subject and body are given
    pub async fn send_email_with(
        &self,
        id: i64,
        subject: Option<&str>,
        body: Option<&str>,
    ) -> Result<EmailSendResult> {
        let subject = subject.filter(|s| !s.trim().is_empty());
        let body = body.filter(|b| !b.trim().is_empty());
        let request = SendEmailRequest {
            regenerate: subject.is_none() || body.is_none(),
            subject: subject.map(str::to_string),
            body: body.map(str::to_string),
        };
        self.send_email(id, &request).await
    }

    /// Write an `.eml` draft on the server without sending it
    pub async fn compose_email(&self, id: i64) -> Result<ComposeResult> {
        self.post(&format!("/leads/{id}/email/compose"), &serde_json::json!({}))
            .await
    }

    // ── Follow-ups ──

    /// Paste call notes or transcripts as follow-up context (form-encoded)
    pub async fn ingest(&self, id: i64, text: &str) -> Result<IngestResult> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation("text_required".to_string()));
        }
        let request = self.authorized(
            self.http
                .post(self.url(&format!("/leads/{id}/followups/ingest")))
                .form(&[("text", text)]),
        );
        decode(request.send().await?).await
    }

    /// Ask for the next-step plan via `/followups/run`, falling back to
    /// `/followups/next` on servers that only expose the older route
    pub async fn run_autopilot(&self, id: i64) -> Result<AutopilotPlan> {
        let empty = serde_json::json!({});
        match self.post(&format!("/leads/{id}/followups/run"), &empty).await {
            Err(e) if e.is_not_found() && e.detail().as_deref() != Some("Lead not found") => {
                debug!("followups/run unavailable, retrying followups/next");
                self.post(&format!("/leads/{id}/followups/next"), &empty).await
            }
            other => other,
        }
    }

    pub async fn run_agent(&self, id: i64) -> Result<AgentRun> {
        self.post(&format!("/leads/{id}/followups/agent"), &serde_json::json!({}))
            .await
    }

    pub async fn retention_preview(&self, request: &RetentionRequest) -> Result<RetentionPreview> {
        self.post("/retention/preview", request).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}
