//! Outbound SMS: Twilio REST or a dry-run logger

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::SmsReceipt;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

#[async_trait]
pub trait SmsTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt>;
}

/// Logs the message and reports it as queued
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSms;

#[async_trait]
impl SmsTransport for DryRunSms {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt> {
        info!("[DRY RUN] Would send SMS to {}: {}", to, body);
        Ok(SmsReceipt {
            sid: "dry_run".to_string(),
            status: "queued".to_string(),
            to: to.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl TwilioCredentials {
    fn is_complete(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

#[derive(Debug)]
pub struct TwilioSms {
    client: Client,
    credentials: TwilioCredentials,
    base_url: String,
}

impl TwilioSms {
    pub fn new(credentials: TwilioCredentials) -> Self {
        Self::with_base_url(credentials, TWILIO_API_BASE.to_string())
    }

    pub fn with_base_url(credentials: TwilioCredentials, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
    status: String,
    to: String,
}

#[async_trait]
impl SmsTransport for TwilioSms {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        );
        debug!("Twilio send to {} ({} chars)", to, body.len());

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[
                ("To", to),
                ("From", self.credentials.from_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .context("Failed to send request to Twilio")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Twilio request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let msg: TwilioMessageResponse = response
            .json()
            .await
            .context("Failed to parse Twilio response")?;
        Ok(SmsReceipt {
            sid: msg.sid,
            status: msg.status,
            to: msg.to,
        })
    }
}

/// Twilio when live sending is requested and credentials are complete, otherwise dry-run
pub fn sms_transport(dry_run: bool, credentials: Option<TwilioCredentials>) -> Arc<dyn SmsTransport> {
    match credentials {
        Some(creds) if !dry_run && creds.is_complete() => {
            info!("SMS transport: twilio (from {})", creds.from_number);
            Arc::new(TwilioSms::new(creds))
        }
        Some(_) if !dry_run => {
            warn!("Twilio credentials incomplete, falling back to dry-run SMS");
            Arc::new(DryRunSms)
        }
        _ => {
            info!("SMS transport: dry_run");
            Arc::new(DryRunSms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> TwilioCredentials {
        TwilioCredentials {
            account_sid: "AC123".to_string(),
            auth_token: "secret-token".to_string(),
            from_number: "+15551112222".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dry_run_receipt() {
        let receipt = DryRunSms.send("+15550000000", "hi").await.unwrap();
        assert_eq!(receipt.sid, "dry_run");
        assert_eq!(receipt.status, "queued");
        assert_eq!(receipt.to, "+15550000000");
    }

    #[test]
    fn test_transport_selection() {
        assert_eq!(sms_transport(true, Some(creds())).name(), "dry_run");
        assert_eq!(sms_transport(false, None).name(), "dry_run");
        assert_eq!(sms_transport(false, Some(creds())).name(), "twilio");

        let mut partial = creds();
        partial.auth_token.clear();
        assert_eq!(sms_transport(false, Some(partial)).name(), "dry_run");
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        assert!(!format!("{:?}", creds()).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_twilio_send_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .match_header("authorization", mockito::Matcher::Regex("^Basic ".to_string()))
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("To".to_string(), "+15550000000".to_string()),
                mockito::Matcher::UrlEncoded("From".to_string(), "+15551112222".to_string()),
                mockito::Matcher::UrlEncoded("Body".to_string(), "hello there".to_string()),
            ]))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sid":"SM42","status":"queued","to":"+15550000000"}"#)
            .create_async()
            .await;

        let twilio = TwilioSms::with_base_url(creds(), server.url());
        let receipt = twilio.send("+15550000000", "hello there").await.unwrap();
        assert_eq!(receipt.sid, "SM42");
        assert_eq!(receipt.status, "queued");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_twilio_error_includes_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .with_status(401)
            .with_body("bad auth")
            .create_async()
            .await;

        let twilio = TwilioSms::with_base_url(creds(), server.url());
        let err = twilio.send("+15550000000", "x").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
