use anyhow::{Context, Result};
use leadpilot_core::transport::{SmtpSettings, TwilioCredentials};
use leadpilot_core::{AgentSettings, Branding, EnrichmentMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadPilotConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub branding: Branding,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

// ── Server ──────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub auth_token: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("auth_token", &mask_secret(&self.auth_token))
            .finish()
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8010
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auth_token: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ── Storage ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "~/.leadpilot/leadpilot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_outbox_dir")]
    pub dir: String,
}

fn default_outbox_dir() -> String {
    "~/.leadpilot/outbox".to_string()
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            dir: default_outbox_dir(),
        }
    }
}

// ── OpenAI ──────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

impl OpenAiConfig {
    /// GPT copy is only used when a key is configured
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// ── Transports ──────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("dry_run", &self.dry_run)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &mask_secret(&self.auth_token))
            .field("from_number", &self.from_number)
            .finish()
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
        }
    }
}

impl SmsConfig {
    /// `None` when no Twilio field is set at all
    pub fn credentials(&self) -> Option<TwilioCredentials> {
        if self.account_sid.is_empty() && self.auth_token.is_empty() && self.from_number.is_empty()
        {
            return None;
        }
        Some(TwilioCredentials {
            account_sid: self.account_sid.clone(),
            auth_token: self.auth_token.clone(),
            from_number: self.from_number.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTransportKind {
    #[default]
    Console,
    Smtp,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub transport: EmailTransportKind,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("transport", &self.transport)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &mask_secret(&self.password))
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportKind::Console,
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl EmailConfig {
    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

// ── Enrichment / agent ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub mode: EnrichmentMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_agent_interval")]
    pub min_interval_secs: u64,
    /// Falls back to `openai.model` when unset
    #[serde(default)]
    pub model: Option<String>,
}

fn default_agent_interval() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: default_agent_interval(),
            model: None,
        }
    }
}

impl AgentConfig {
    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            enabled: self.enabled,
            min_interval_secs: self.min_interval_secs,
        }
    }
}

// ── Dashboard client ────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_token: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("api_token", &mask_secret(&self.api_token))
            .finish()
    }
}

fn default_api_base() -> String {
    "http://127.0.0.1:8010".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_token: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Mask a secret string for safe display.
/// Shows the first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".leadpilot")
}

impl LeadPilotConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        // The file holds API keys; refuse group/other-readable configs
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `leadpilot init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        config.warn_hardcoded_secrets();
        Ok(config)
    }

    /// Expand allowlisted `${VAR}`s, then parse TOML
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        Ok(toml::from_str(&expanded)?)
    }

    fn warn_hardcoded_secrets(&self) {
        if self.openai.api_key.starts_with("sk-") {
            warn!(
                "OpenAI key is hardcoded in config file. For security, use environment variables: api_key = \"${{OPENAI_API_KEY}}\""
            );
        }
        if !self.server.auth_token.is_empty() && self.server.auth_token.len() < 16 {
            warn!("server.auth_token is shorter than 16 characters");
        }
    }

    /// Copy safe to print: secrets replaced by their masked form
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        for secret in [
            &mut cfg.server.auth_token,
            &mut cfg.openai.api_key,
            &mut cfg.sms.auth_token,
            &mut cfg.email.password,
            &mut cfg.client.api_token,
        ] {
            *secret = mask_secret(secret);
        }
        cfg
    }

    /// Token the dashboard commands send; the server's own token when unset
    pub fn client_token(&self) -> Option<String> {
        [&self.client.api_token, &self.server.auth_token]
            .into_iter()
            .find(|t| !t.is_empty())
            .cloned()
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.database.path)
    }

    pub fn outbox_dir(&self) -> PathBuf {
        expand_path(&self.outbox.dir)
    }
}

/// Environment variables that may be expanded in config files.
/// Anything else is left as a literal `${VAR}`.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "LEADPILOT_API_TOKEN",
    "CALENDLY_URL",
    "TWILIO_ACCOUNT_SID",
    "TWILIO_AUTH_TOKEN",
    "TWILIO_FROM_NUMBER",
    "SMTP_HOST",
    "SMTP_USER",
    "SMTP_PASS",
    "EMAIL_FROM",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        // skip past the value so a value containing `${` is not re-expanded
        pos = abs_start + value.len();
    }
    result
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(s: &str) -> PathBuf {
    match s.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| Path::new(s).to_path_buf()),
        None => PathBuf::from(s),
    }
}
