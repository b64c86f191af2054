//! Gateway HTTP server: Axum REST API over `OutreachService`

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{FromRequest, Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router, middleware};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use leadpilot_core::types::{
    AddNoteRequest, CaptureRequest, IngestRequest, SendEmailRequest, SendSmsRequest,
};
use leadpilot_core::{OutreachService, RetentionRequest};

use crate::auth;
use crate::error::ApiError;
use crate::extract::ApiJson;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared state for all handlers
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<OutreachService>,
    /// Bearer token required on `/api/*`; empty disables auth
    pub auth_token: String,
    pub start_time: std::time::Instant,
}

pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, service: Arc<OutreachService>, auth_token: String) -> Self {
        let state = GatewayState {
            service,
            auth_token,
            start_time: std::time::Instant::now(),
        };
        Self { state, bind }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);
        if self.state.auth_token.is_empty() {
            info!("API auth disabled (no token configured)");
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}

pub fn router(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/leads", get(list_leads_handler))
        .route("/leads/capture", post(capture_handler))
        .route("/leads/personalize/batch", post(personalize_batch_handler))
        .route("/leads/{id}", get(get_lead_handler))
        .route("/leads/{id}/personalize", post(personalize_handler))
        .route("/leads/{id}/messages", get(thread_handler))
        .route("/leads/{id}/sms/send", post(send_sms_handler))
        .route("/leads/{id}/email/send", post(send_email_handler))
        .route("/leads/{id}/email/compose", post(compose_handler))
        .route("/leads/{id}/notes", post(add_note_handler))
        .route("/leads/{id}/followups/ingest", post(ingest_handler))
        .route("/leads/{id}/followups/autopilot", post(autopilot_handler))
        .route("/leads/{id}/followups/run", post(autopilot_handler))
        .route("/leads/{id}/followups/next", post(autopilot_handler))
        .route("/leads/{id}/followups/agent", post(agent_handler))
        .route("/retention/preview", post(retention_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/", get(health_handler))
        .nest("/api", api)
        .route("/integrations/twilio/inbound", post(twilio_inbound_handler))
        .route("/integrations/email/inbound", post(email_inbound_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──

async fn health_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "LeadPilot API running",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

// ── Leads ──

async fn list_leads_handler(
    State(state): State<GatewayState>,
) -> ApiResult<Vec<leadpilot_store::Lead>> {
    Ok(Json(state.service.list_leads().await?))
}

async fn get_lead_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> ApiResult<leadpilot_store::Lead> {
    Ok(Json(state.service.get_lead(id).await?))
}

async fn capture_handler(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<CaptureRequest>,
) -> ApiResult<leadpilot_store::Lead> {
    Ok(Json(state.service.capture(body).await?))
}

async fn thread_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<leadpilot_store::Message>> {
    Ok(Json(state.service.thread(id).await?))
}

// ── Personalization ──

async fn personalize_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> ApiResult<leadpilot_core::PersonalizationResult> {
    Ok(Json(state.service.personalize(id).await?))
}

async fn personalize_batch_handler(
    State(state): State<GatewayState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<leadpilot_core::BatchPersonalization> {
    Ok(Json(state.service.personalize_batch(&ids).await?))
}

// ── Outbound ──

async fn send_sms_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
    body: Option<ApiJson<SendSmsRequest>>,
) -> ApiResult<leadpilot_core::SmsSendResult> {
    let request = body.map(|ApiJson(b)| b).unwrap_or_default();
    Ok(Json(state.service.send_sms(id, request).await?))
}

async fn send_email_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
    body: Option<ApiJson<SendEmailRequest>>,
) -> ApiResult<leadpilot_core::EmailSendResult> {
    let request = body.map(|ApiJson(b)| b).unwrap_or_default();
    Ok(Json(state.service.send_email(id, request).await?))
}

async fn compose_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> ApiResult<leadpilot_core::ComposeResult> {
    Ok(Json(state.service.compose_email(id).await?))
}

async fn add_note_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<AddNoteRequest>,
) -> ApiResult<leadpilot_store::Message> {
    Ok(Json(state.service.add_note(id, body).await?))
}

// ── Follow-ups ──

/// Accepts `{"text": ...}` as JSON or a form field
async fn ingest_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
    request: Request,
) -> ApiResult<leadpilot_core::IngestResult> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let text = if is_json {
        Json::<IngestRequest>::from_request(request, &())
            .await
            .ok()
            .and_then(|Json(body)| body.text)
    } else {
        Form::<IngestRequest>::from_request(request, &())
            .await
            .ok()
            .and_then(|Form(body)| body.text)
    };

    Ok(Json(state.service.ingest_context(id, text.as_deref()).await?))
}

async fn autopilot_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> ApiResult<leadpilot_core::AutopilotPlan> {
    Ok(Json(state.service.run_autopilot(id).await?))
}

async fn agent_handler(
    State(state): State<GatewayState>,
    Path(id): Path<i64>,
) -> ApiResult<leadpilot_core::AgentRun> {
    Ok(Json(state.service.run_agent(id).await?))
}

// ── Retention ──

async fn retention_handler(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<RetentionRequest>,
) -> ApiResult<leadpilot_core::RetentionPreview> {
    Ok(Json(state.service.retention_preview(&body)?))
}

// ── Inbound webhooks ──

fn form_field<'a>(form: &'a HashMap<String, String>, names: &[&str]) -> &'a str {
    names
        .iter()
        .find_map(|n| form.get(*n))
        .map(String::as_str)
        .unwrap_or("")
}

async fn twilio_inbound_handler(
    State(state): State<GatewayState>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<leadpilot_core::InboundResult> {
    let from = form_field(&form, &["From"]);
    let body = form_field(&form, &["Body"]);
    debug!("Twilio inbound from {:?}", from);
    Ok(Json(state.service.record_inbound_sms(from, body).await?))
}

async fn email_inbound_handler(
    State(state): State<GatewayState>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<leadpilot_core::InboundResult> {
    let from = form_field(&form, &["From", "from"]);
    let to = form_field(&form, &["To", "to"]);
    let subject = form_field(&form, &["Subject", "subject"]);
    let text = form_field(&form, &["Text", "text"]);
    if from.trim().is_empty() {
        return Err(ApiError::BadRequest("From required".to_string()));
    }
    debug!("Email inbound from {:?} to {:?}", from, to);
    Ok(Json(
        state
            .service
            .record_inbound_email(from, subject, text)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use leadpilot_core::transport::{ConsoleEmail, Outbox, SmsTransport};
    use leadpilot_core::{Branding, PersonalizationService, SmsReceipt};
    use leadpilot_store::LeadStore;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state(token: &str) -> (GatewayState, TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let branding = Branding {
            booking_url: "https://cal.example/intro".to_string(),
            ..Branding::default()
        };
        let service = OutreachService::offline(
            LeadStore::open_in_memory().unwrap(),
            tmp.path().join("emails"),
            branding,
        );
        let state = GatewayState {
            service: Arc::new(service),
            auth_token: token.to_string(),
            start_time: std::time::Instant::now(),
        };
        (state, tmp)
    }

    struct DownSms;

    #[async_trait]
    impl SmsTransport for DownSms {
        fn name(&self) -> &str {
            "down"
        }

        async fn send(&self, _to: &str, _body: &str) -> anyhow::Result<SmsReceipt> {
            anyhow::bail!("twilio 503")
        }
    }

    fn state_with_down_sms() -> (GatewayState, TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let branding = Branding::default();
        let outbox = Outbox::new(tmp.path().join("emails"), &branding);
        let service = OutreachService::new(
            LeadStore::open_in_memory().unwrap(),
            PersonalizationService::mock(branding),
            Arc::new(DownSms),
            Arc::new(ConsoleEmail::new(outbox.clone())),
            outbox,
        );
        let state = GatewayState {
            service: Arc::new(service),
            auth_token: String::new(),
            start_time: std::time::Instant::now(),
        };
        (state, tmp)
    }

    async fn send(app: &Router, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_form(uri: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn capture(app: &Router, name: &str, email: &str) -> i64 {
        let (status, lead) = send(
            app,
            post_json("/api/leads/capture", json!({"name": name, "email": email})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        lead["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _tmp) = state("");
        let app = router(state);
        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "LeadPilot API running");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_capture_list_get() {
        let (state, _tmp) = state("");
        let app = router(state);
        let first = capture(&app, "Dana", "dana@acme.io").await;
        let second = capture(&app, "Fox", "fox@acme.io").await;

        let (status, leads) = send(&app, get("/api/leads")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(leads[0]["id"], second);
        assert_eq!(leads[1]["id"], first);
        assert_eq!(leads[0]["enriched"], "success");

        let (status, lead) = send(&app, get(&format!("/api/leads/{first}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(lead["phone"], "+15550000000");
    }

    #[tokio::test]
    async fn test_duplicate_capture_is_400_with_detail() {
        let (state, _tmp) = state("");
        let app = router(state);
        capture(&app, "Dana", "dana@acme.io").await;
        let (status, body) = send(
            &app,
            post_json("/api/leads/capture", json!({"name": "D", "email": "dana@acme.io"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Lead with email dana@acme.io already exists");
    }

    #[tokio::test]
    async fn test_malformed_json_bodies_use_detail() {
        let (state, _tmp) = state("");
        let app = router(state);

        let (status, body) = send(&app, post_json("/api/leads/capture", json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("missing field `email`"));

        let (status, body) = send(&app, post_json("/api/leads/personalize/batch", json!({"ids": [1]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());

        let id = capture(&app, "Dana", "dana@acme.io").await;
        let request = axum::http::Request::post(format!("/api/leads/{id}/sms/send"))
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_sms_delivery_failure_is_502() {
        let (state, _tmp) = state_with_down_sms();
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;

        let (status, body) = send(
            &app,
            post_json(&format!("/api/leads/{id}/sms/send"), json!({"body": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["detail"].as_str().unwrap().contains("twilio 503"));

        let (_, thread) = send(&app, get(&format!("/api/leads/{id}/messages"))).await;
        assert_eq!(thread[0]["status"], "failed");
    }

    #[tokio::test]
    async fn test_missing_lead_is_404() {
        let (state, _tmp) = state("");
        let app = router(state);
        let (status, body) = send(&app, post_json("/api/leads/42/personalize", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Lead not found");
    }

    #[tokio::test]
    async fn test_personalize_and_batch() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana Scully", "dana@acme.io").await;

        let (status, body) = send(&app, post_json(&format!("/api/leads/{id}/personalize"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lead_name"], "Dana Scully");
        assert!(body["messages"]["sms"].as_str().unwrap().starts_with("Hi Dana!"));
        assert!(body["messages"]["email"]["subject"].is_string());

        let (status, batch) = send(&app, post_json("/api/leads/personalize/batch", json!([id, 999]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(batch["total"], 1);
    }

    #[tokio::test]
    async fn test_sms_send_without_body_and_thread() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;

        let request = axum::http::Request::post(format!("/api/leads/{id}/sms/send"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], true);
        assert_eq!(body["provider"]["sid"], "dry_run");

        let (_, thread) = send(&app, get(&format!("/api/leads/{id}/messages"))).await;
        assert_eq!(thread.as_array().unwrap().len(), 1);
        assert_eq!(thread[0]["channel"], "sms");
        assert_eq!(thread[0]["status"], "queued");
    }

    #[tokio::test]
    async fn test_email_send_and_compose() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;

        let (status, sent) = send(
            &app,
            post_json(&format!("/api/leads/{id}/email/send"), json!({"regenerate": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sent["provider"]["transport"], "console");
        assert!(sent["provider"]["eml_path"].as_str().unwrap().ends_with(".eml"));

        let (status, composed) = send(&app, post_json(&format!("/api/leads/{id}/email/compose"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(composed["ok"], true);
    }

    #[tokio::test]
    async fn test_ingest_json_form_and_blank() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;
        let uri = format!("/api/leads/{id}/followups/ingest");

        let (status, body) = send(&app, post_json(&uri, json!({"text": " too expensive "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored_bytes"], 13);

        let (status, body) = send(&app, post_form(&uri, "text=maybe+next+month")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored_bytes"], 16);

        let (status, body) = send(&app, post_form(&uri, "text=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "text_required");

        let (status, _) = send(&app, post_json("/api/leads/999/followups/ingest", json!({"text": "hi"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_autopilot_aliases() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;
        send(
            &app,
            post_json(&format!("/api/leads/{id}/followups/ingest"), json!({"text": "Ready! but what about claims?"})),
        )
        .await;

        for path in ["autopilot", "run", "next"] {
            let (status, plan) =
                send(&app, post_json(&format!("/api/leads/{id}/followups/{path}"), json!({}))).await;
            assert_eq!(status, StatusCode::OK, "{path}");
            assert_eq!(plan["state"]["intent"], "ready_to_switch");
            assert_eq!(plan["state"]["objections"], json!(["claims"]));
            assert_eq!(plan["plan"][2]["action"], "task");
            assert_eq!(plan["plan"][1]["meta"]["calendly"], "https://cal.example/intro");
        }
    }

    #[tokio::test]
    async fn test_agent_endpoint() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;

        let uri = format!("/api/leads/{id}/followups/agent");
        let (status, run) = send(&app, post_json(&uri, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["outcome"], "executed");
        assert_eq!(run["plan"]["stage"], "evaluating");

        let (_, again) = send(&app, post_json(&uri, json!({}))).await;
        assert_eq!(again["outcome"], "throttled");
    }

    #[tokio::test]
    async fn test_inbound_webhooks() {
        let (state, _tmp) = state("");
        let app = router(state);
        let id = capture(&app, "Dana", "dana@acme.io").await;

        let (status, body) = send(
            &app,
            post_form("/integrations/twilio/inbound", "From=%2B15550000000&Body=too+expensive"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matched_lead_id"], id);

        let (status, body) = send(
            &app,
            post_form("/integrations/email/inbound", "from=dana%40acme.io&subject=Re&text=maybe"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = send(&app, post_form("/integrations/email/inbound", "Text=hi")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "From required");

        let (status, body) = send(
            &app,
            post_form("/integrations/twilio/inbound", "From=%2B19998887777&Body=hi"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No lead matched by phone");
    }

    #[tokio::test]
    async fn test_retention_preview() {
        let (state, _tmp) = state("");
        let app = router(state);
        let (status, body) = send(
            &app,
            post_json(
                "/api/retention/preview",
                json!({"customer": {"name": "Alex Rivera"}, "event": "low_mileage", "health_score": 95}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggested_score"], 100);

        let (status, body) = send(
            &app,
            post_json("/api/retention/preview", json!({"customer": {"name": "A"}, "event": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_api_token_required_when_configured() {
        let (state, _tmp) = state("s3cret");
        let app = router(state);

        let (status, body) = send(&app, get("/api/leads")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Unauthorized");

        let request = axum::http::Request::get("/api/leads")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        // health and webhooks stay open
        let (status, _) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
