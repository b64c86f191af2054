use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use leadpilot_client::{CaptureForm, DashboardClient};
use leadpilot_core::transport::{
    ConsoleEmail, EmailTransport, Outbox, SmtpEmail, sms_transport,
};
use leadpilot_core::{
    FollowupAgent, LlmProvider, OpenAiProvider, OutreachService, PersonalizationService,
    RetentionCustomer, RetentionRequest,
};
use leadpilot_gateway::GatewayServer;
use leadpilot_store::LeadStore;

mod config;

use config::{EmailTransportKind, LeadPilotConfig};

#[derive(Parser)]
#[command(name = "leadpilot")]
#[command(version)]
#[command(about = "LeadPilot: lead capture, personalization and follow-up autopilot")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration (secrets masked)
    Config,

    /// Run the REST API
    Serve {
        /// Override server.bind
        #[arg(long)]
        bind: Option<String>,
        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List captured leads, newest first
    Leads,

    /// Show one lead
    Lead { id: i64 },

    /// Capture a lead, personalize outreach and archive the email draft
    Capture(CaptureArgs),

    /// Generate outreach copy for one or more leads
    Personalize {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Show a lead's message thread
    Thread { id: i64 },

    /// Send an SMS; generated copy unless --body is given
    Sms {
        id: i64,
        #[arg(long)]
        body: Option<String>,
    },

    /// Send an email; regenerated unless both --subject and --body are given
    Email {
        id: i64,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// Write an .eml draft instead of sending
        #[arg(long, conflicts_with_all = ["subject", "body"])]
        compose: bool,
    },

    /// Store call notes or a transcript as follow-up context
    Ingest { id: i64, text: String },

    /// Plan the next follow-up steps
    Autopilot { id: i64 },

    /// Run the LLM follow-up agent
    Agent { id: i64 },

    /// Preview a retention campaign for a life event
    Retention {
        /// Event key, e.g. new_baby, home_reno, teen_driver
        #[arg(long)]
        event: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 72)]
        health_score: i32,
        /// Repeatable, e.g. --policy Auto --policy Home
        #[arg(long = "policy")]
        policies: Vec<String>,
    },
}

#[derive(clap::Args)]
struct CaptureArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    life_stage: Option<String>,
    #[arg(long)]
    insurer: Option<String>,
    #[arg(long)]
    renewal_date: Option<String>,
    #[arg(long)]
    pain_points: Option<String>,
    #[arg(long)]
    source: Option<String>,
}

impl From<CaptureArgs> for CaptureForm {
    fn from(args: CaptureArgs) -> Self {
        Self {
            name: args.name,
            email: args.email,
            phone: args.phone,
            company: args.company,
            title: args.title,
            location: args.location,
            life_stage: args.life_stage,
            insurer: args.insurer,
            renewal_date: args.renewal_date,
            pain_points: args.pain_points,
            source: args.source,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Serve { bind, port } => cmd_serve(&cli.config, bind, port).await,
        command => cmd_dashboard(&cli.config, command).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    tokio::fs::create_dir_all(config_dir.join("outbox")).await?;

    println!("LeadPilot initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure OpenAI, Twilio and SMTP.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = LeadPilotConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg.redacted())?);
    Ok(())
}

async fn cmd_serve(
    config_path: &Option<PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut cfg = LeadPilotConfig::load(config_path)?;
    if let Some(bind) = bind {
        cfg.server.bind = bind;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }
    let addr: SocketAddr = cfg
        .server
        .address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", cfg.server.address()))?;

    info!("Starting LeadPilot API...");
    let service = Arc::new(build_service(&cfg).await?);
    if cfg.server.auth_token.is_empty() {
        warn!("server.auth_token is empty; /api is open to anyone who can reach {}", addr);
    }
    let server = GatewayServer::new(addr, service, cfg.server.auth_token.clone());

    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn(server.run(cancel.clone()));

    tokio::select! {
        result = &mut handle => {
            // exited before Ctrl+C, e.g. the port was taken
            result.context("Gateway task panicked")??;
            return Ok(());
        }
        ctrl_c = signal::ctrl_c() => {
            ctrl_c?;
            info!("Received Ctrl+C, shutting down...");
        }
    }

    cancel.cancel();
    handle.await.context("Gateway task panicked")??;

    println!("LeadPilot stopped.");
    Ok(())
}

fn openai_provider(cfg: &LeadPilotConfig, model: &str) -> Option<Arc<dyn LlmProvider>> {
    if !cfg.openai.is_configured() {
        return None;
    }
    Some(Arc::new(OpenAiProvider::new(
        cfg.openai.api_key.clone(),
        model.to_string(),
        cfg.openai.base_url.clone(),
    )))
}

async fn build_service(cfg: &LeadPilotConfig) -> Result<OutreachService> {
    let db_path = cfg.database_path();
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = LeadStore::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!("Lead database at {}", db_path.display());

    let branding = cfg.branding.clone();
    let outbox = Outbox::new(cfg.outbox_dir(), &branding);

    let provider = openai_provider(cfg, &cfg.openai.model);
    if provider.is_none() {
        info!("No OpenAI key configured, using template copy");
    }
    let personalization = PersonalizationService::new(provider, branding.clone());

    let sms = sms_transport(cfg.sms.dry_run, cfg.sms.credentials());
    let email: Arc<dyn EmailTransport> = match cfg.email.transport {
        EmailTransportKind::Console => Arc::new(ConsoleEmail::new(outbox.clone())),
        EmailTransportKind::Smtp => Arc::new(
            SmtpEmail::new(
                &cfg.email.smtp_settings(),
                &branding.sender_company,
                &branding.from_address,
            )
            .context("Failed to configure SMTP transport")?,
        ),
    };

    let agent_model = cfg.agent.model.as_deref().unwrap_or(&cfg.openai.model);
    let agent = FollowupAgent::new(openai_provider(cfg, agent_model), cfg.agent.settings());

    Ok(OutreachService::new(store, personalization, sms, email, outbox)
        .with_enrichment(cfg.enrichment.mode)
        .with_agent(agent))
}

/// Commands that talk to a running server over HTTP
async fn cmd_dashboard(config_path: &Option<PathBuf>, command: Commands) -> Result<()> {
    let cfg = LeadPilotConfig::load(config_path)?;
    let client = DashboardClient::new(&cfg.client.api_base, cfg.client_token())
        .with_booking_url(cfg.branding.booking_url.trim());

    match command {
        Commands::Leads => {
            let leads = client.list_leads().await?;
            if leads.is_empty() {
                println!("No leads yet.");
            }
            for lead in leads {
                println!(
                    "{:>5}  {:<24} {:<32} {}",
                    lead.id,
                    lead.name,
                    lead.email,
                    lead.company.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Lead { id } => print_json(&client.get_lead(id).await?)?,
        Commands::Capture(args) => {
            let outcome = client.capture_and_personalize(&args.into()).await?;
            if !outcome.archived {
                warn!("Email draft was not archived to the outbox");
            }
            print_json(&outcome)?;
        }
        Commands::Personalize { ids } => match ids.as_slice() {
            [id] => print_json(&client.personalize(*id).await?)?,
            _ => print_json(&client.personalize_batch(&ids).await?)?,
        },
        Commands::Thread { id } => {
            for message in client.thread(id).await? {
                let subject = message
                    .subject
                    .as_deref()
                    .map(|s| format!(" [{s}]"))
                    .unwrap_or_default();
                println!(
                    "{}  {:<8} {:<5} {:<9}{}\n    {}",
                    message.created_at.format("%Y-%m-%d %H:%M"),
                    message.direction,
                    message.channel,
                    message.status,
                    subject,
                    message.body.replace('\n', "\n    ")
                );
            }
        }
        Commands::Sms { id, body } => print_json(&client.send_sms(id, body.as_deref()).await?)?,
        Commands::Email {
            id,
            subject,
            body,
            compose,
        } => {
            if compose {
                print_json(&client.compose_email(id).await?)?;
            } else {
                let result = client
                    .send_email_with(id, subject.as_deref(), body.as_deref())
                    .await?;
                print_json(&result)?;
            }
        }
        Commands::Ingest { id, text } => print_json(&client.ingest(id, &text).await?)?,
        Commands::Autopilot { id } => print_json(&client.run_autopilot(id).await?)?,
        Commands::Agent { id } => print_json(&client.run_agent(id).await?)?,
        Commands::Retention {
            event,
            name,
            health_score,
            policies,
        } => {
            let request = RetentionRequest {
                customer: RetentionCustomer {
                    name,
                    email: None,
                    phone: None,
                    policies,
                    location: None,
                    current_carrier: None,
                },
                event,
                health_score,
            };
            print_json(&client.retention_preview(&request).await?)?;
        }
        Commands::Init | Commands::Config | Commands::Serve { .. } => {
            anyhow::bail!("not a dashboard command")
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
