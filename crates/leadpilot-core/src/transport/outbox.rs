//! On-disk `.eml` outbox used by the console email transport and compose

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::branding::Branding;

/// A rendered outgoing email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    dir: PathBuf,
    sender_name: String,
    from_address: String,
}

impl Outbox {
    pub fn new(dir: impl Into<PathBuf>, branding: &Branding) -> Self {
        Self {
            dir: dir.into(),
            sender_name: branding.sender_company.clone(),
            from_address: branding.from_address.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `email` as a plain-text `.eml` file and return its path
    pub async fn write(&self, email: &OutgoingEmail) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create outbox dir {}", self.dir.display()))?;

        let base = eml_file_name(&email.to_email);
        let rendered = self.render(email);
        let mut attempt = 0;
        loop {
            let path = self.dir.join(numbered_name(&base, attempt));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            };
            file.write_all(rendered.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            debug!("Wrote {} ({} bytes body)", path.display(), email.body.len());
            return Ok(path);
        }
    }

    pub fn render(&self, email: &OutgoingEmail) -> String {
        format!(
            "From: {} <{}>\nTo: {} <{}>\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}",
            self.sender_name,
            self.from_address,
            email.to_name,
            email.to_email,
            email.subject,
            email.body
        )
    }
}

/// `20250101-120000__dana_at_acme.io.eml`
pub fn eml_file_name(to_email: &str) -> String {
    let safe = to_email.replace('@', "_at_").replace('/', "_");
    format!("{}__{}.eml", Utc::now().format("%Y%m%d-%H%M%S"), safe)
}

/// `name.eml` for the first attempt, then `name-1.eml`, `name-2.eml`...
fn numbered_name(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let stem = base.strip_suffix(".eml").unwrap_or(base);
    format!("{stem}-{attempt}.eml")
}

/// Ensure `url` appears in `body`, adding `Book a time:` at the end when missing
pub fn append_booking_link(body: &str, url: Option<&str>) -> String {
    match url {
        Some(url) if !url.is_empty() && !body.contains(url) => {
            format!("{}\n\nBook a time: {}\n", body.trim_end(), url)
        }
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to_name: "Dana Scully".to_string(),
            to_email: "dana@acme.io".to_string(),
            subject: "Coverage review".to_string(),
            body: "Hi Dana".to_string(),
        }
    }

    #[test]
    fn test_eml_file_name_sanitizes_address() {
        let name = eml_file_name("dana/x@acme.io");
        assert!(name.ends_with("__dana_x_at_acme.io.eml"));
        // YYYYmmdd-HHMMSS prefix
        assert_eq!(name.find("__"), Some(15));
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("a__b.eml", 0), "a__b.eml");
        assert_eq!(numbered_name("a__b.eml", 2), "a__b-2.eml");
    }

    #[tokio::test]
    async fn test_write_keeps_earlier_copy() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let outbox = Outbox::new(tmp.path(), &Branding::default());

        let first = outbox.write(&email()).await?;
        let mut second_email = email();
        second_email.subject = "Draft".to_string();
        let second = outbox.write(&second_email).await?;

        assert_ne!(first, second);
        assert!(std::fs::read_to_string(&first)?.contains("Subject: Coverage review"));
        assert!(std::fs::read_to_string(&second)?.contains("Subject: Draft"));
        Ok(())
    }

    #[test]
    fn test_append_booking_link() {
        let url = Some("https://cal.example/intro");
        assert_eq!(
            append_booking_link("Hi\n\n", url),
            "Hi\n\nBook a time: https://cal.example/intro\n"
        );
        let once = append_booking_link("Hi", url);
        assert_eq!(append_booking_link(&once, url), once);
        assert_eq!(append_booking_link("Hi", None), "Hi");
        assert_eq!(append_booking_link("Hi", Some("")), "Hi");
    }

    #[tokio::test]
    async fn test_write_renders_headers() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let outbox = Outbox::new(tmp.path().join("emails"), &Branding::default());

        let path = outbox.write(&email()).await?;
        let content = std::fs::read_to_string(&path)?;

        assert!(path.starts_with(tmp.path()));
        assert_eq!(
            content,
            "From: LeadPilot <noreply@leadpilot.dev>\n\
             To: Dana Scully <dana@acme.io>\n\
             Subject: Coverage review\n\
             Content-Type: text/plain; charset=utf-8\n\
             \n\
             Hi Dana"
        );
        Ok(())
    }
}
