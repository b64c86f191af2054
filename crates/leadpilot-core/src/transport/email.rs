//! Outbound email: `.eml` files in the outbox, or STARTTLS SMTP

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::outbox::{OutgoingEmail, Outbox};
use crate::types::EmailReceipt;

#[async_trait]
pub trait EmailTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<EmailReceipt>;
}

/// Writes each email to the outbox instead of delivering it
#[derive(Debug, Clone)]
pub struct ConsoleEmail {
    outbox: Outbox,
}

impl ConsoleEmail {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl EmailTransport for ConsoleEmail {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<EmailReceipt> {
        let path = self.outbox.write(email).await?;
        info!("Email to {} written to {}", email.to_email, path.display());
        Ok(EmailReceipt {
            transport: "console".to_string(),
            sid: "console".to_string(),
            status: "queued".to_string(),
            eml_path: Some(path.display().to_string()),
        })
    }
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub struct SmtpEmail {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmail {
    pub fn new(settings: &SmtpSettings, from_name: &str, from_address: &str) -> Result<Self> {
        let from = Mailbox::new(
            Some(from_name.to_string()),
            from_address
                .parse()
                .with_context(|| format!("Invalid from address {from_address}"))?,
        );

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .with_context(|| format!("Invalid SMTP relay {}", settings.host))?
            .port(settings.port);
        if !settings.username.is_empty() && !settings.password.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        info!("Email transport: smtp ({}:{})", settings.host, settings.port);
        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpEmail {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<EmailReceipt> {
        let to = Mailbox::new(
            Some(email.to_name.clone()),
            email
                .to_email
                .parse()
                .with_context(|| format!("Invalid recipient {}", email.to_email))?,
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .context("Failed to build email")?;

        self.mailer
            .send(message)
            .await
            .with_context(|| format!("SMTP delivery to {} failed", email.to_email))?;
        debug!("SMTP delivered to {}", email.to_email);

        // bare SMTP has no provider id
        Ok(EmailReceipt {
            transport: "smtp".to_string(),
            sid: format!("smtp_{}", Utc::now().timestamp()),
            status: "sent".to_string(),
            eml_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branding::Branding;

    #[tokio::test]
    async fn test_console_email_writes_outbox() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let transport = ConsoleEmail::new(Outbox::new(tmp.path(), &Branding::default()));
        let receipt = transport
            .send(&OutgoingEmail {
                to_name: "Dana".to_string(),
                to_email: "dana@acme.io".to_string(),
                subject: "Hello".to_string(),
                body: "Body".to_string(),
            })
            .await?;

        assert_eq!(receipt.transport, "console");
        assert_eq!(receipt.status, "queued");
        let path = receipt.eml_path.expect("console receipt has a path");
        assert!(path.ends_with("__dana_at_acme.io.eml"));
        assert!(std::fs::read_to_string(path)?.contains("Subject: Hello\n"));
        Ok(())
    }

    #[test]
    fn test_smtp_settings_debug_redacts_password() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "u".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", settings).contains("hunter2"));
    }

    #[test]
    fn test_smtp_rejects_bad_from_address() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
        };
        assert!(SmtpEmail::new(&settings, "LeadPilot", "not an address").is_err());
    }
}
