//! # CertiFlow CLI
//!
//! Command-line interface for certificate campaigns.
//!
//! ## Usage
//!
//! ```bash
//! # Render the first recipient's certificate to a file
//! certiflow preview --project flow.json --template bg.png --out preview.png
//!
//! # Run a campaign from a project file and a recipients CSV
//! certiflow run --project flow.json --template bg.png --recipients list.csv
//!
//! # Same, without touching a real SMTP relay
//! certiflow run --project flow.json --template bg.png --recipients list.csv --dry-run
//!
//! # Start the HTTP job surface
//! certiflow serve --listen 0.0.0.0:8080
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use certiflow::audit::MemoryAuditLog;
use certiflow::campaign::{CampaignRunner, RunEvent, RunSelection};
use certiflow::project::{Project, Recipient, TemplateKind};
use certiflow::quota::{MemoryQuotaStore, PlanTier, UsagePolicy};
use certiflow::render::{self, Template};
use certiflow::server::{serve, ServerConfig};
use certiflow::transport::{MessageTransport, MockTransport, SmtpRelayConfig, SmtpTransport};
use certiflow::CertiflowError;

/// CertiFlow - certificate generation and delivery
#[derive(Parser, Debug)]
#[command(name = "certiflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one recipient's certificate to a file
    Preview {
        /// Project JSON file (fields, email copy)
        #[arg(long)]
        project: PathBuf,

        /// Template asset (PNG/JPEG image or PDF)
        #[arg(long)]
        template: PathBuf,

        /// Output path for the rendered artifact
        #[arg(long)]
        out: PathBuf,

        /// Recipients CSV; the first row is used for the preview
        #[arg(long)]
        recipients: Option<PathBuf>,
    },

    /// Run a campaign: render and email every recipient
    Run {
        /// Project JSON file
        #[arg(long)]
        project: PathBuf,

        /// Template asset (PNG/JPEG image or PDF)
        #[arg(long)]
        template: PathBuf,

        /// Recipients CSV (must have an `email` column; remaining columns
        /// become field data)
        #[arg(long)]
        recipients: PathBuf,

        /// Use the mock transport instead of a real SMTP relay
        #[arg(long)]
        dry_run: bool,

        /// Retry only previously failed rows from the project file
        #[arg(long)]
        retry_failed: bool,

        /// Daily quota to enforce (defaults to the free tier limit)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Start the HTTP job surface
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,

        /// Daily quota applied to callers
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certiflow=info".into()),
        )
        .init();

    if let Err(e) = run_cli().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), CertiflowError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview {
            project,
            template,
            out,
            recipients,
        } => preview(&project, &template, &out, recipients.as_deref()).await,
        Commands::Run {
            project,
            template,
            recipients,
            dry_run,
            retry_failed,
            limit,
        } => {
            run_campaign(
                &project,
                &template,
                &recipients,
                dry_run,
                retry_failed,
                limit.unwrap_or_else(|| UsagePolicy::default().limit_for(PlanTier::Free)),
            )
            .await
        }
        Commands::Serve { listen, limit } => {
            let smtp = SmtpRelayConfig::from_env().ok();
            if smtp.is_none() {
                info!("no SMTP_* environment found, serving with the mock transport");
            }
            let policy = match limit {
                Some(limit) => UsagePolicy::default().with_limit(PlanTier::Free, limit),
                None => UsagePolicy::default(),
            };
            serve(ServerConfig {
                listen_addr: listen,
                plan: PlanTier::Free,
                policy,
                smtp,
            })
            .await
        }
    }
}

/// Guess the template kind from the file extension.
fn template_kind(path: &Path) -> TemplateKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => TemplateKind::Pdf,
        _ => TemplateKind::Image,
    }
}

fn load_project(path: &Path) -> Result<Project, CertiflowError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| CertiflowError::Precondition(format!("invalid project file: {e}")))
}

/// Parse a recipients CSV: `email` column required, every other column
/// becomes a field data entry keyed by its header.
fn load_recipients(path: &Path) -> Result<Vec<Recipient>, CertiflowError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| CertiflowError::Precondition(format!("cannot open recipients CSV: {e}")))?;
    let headers = reader
        .headers()
        .map_err(|e| CertiflowError::Precondition(format!("invalid CSV header: {e}")))?
        .clone();

    let email_column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("email"))
        .ok_or_else(|| {
            CertiflowError::Precondition("recipients CSV needs an `email` column".to_string())
        })?;

    let mut recipients = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| CertiflowError::Precondition(format!("invalid CSV row: {e}")))?;
        let email = record.get(email_column).unwrap_or_default().trim();
        if email.is_empty() {
            continue;
        }
        let mut data = HashMap::new();
        for (i, value) in record.iter().enumerate() {
            if i != email_column {
                if let Some(key) = headers.get(i) {
                    data.insert(key.trim().to_string(), value.trim().to_string());
                }
            }
        }
        recipients.push(Recipient::new(email, data));
    }
    Ok(recipients)
}

async fn preview(
    project_path: &Path,
    template_path: &Path,
    out: &Path,
    recipients_path: Option<&Path>,
) -> Result<(), CertiflowError> {
    let project = load_project(project_path)?;
    let template_bytes = std::fs::read(template_path)?;
    let template = Template::load(template_kind(template_path), &template_bytes)?;

    let recipient = match recipients_path {
        Some(path) => load_recipients(path)?.into_iter().next().ok_or_else(|| {
            CertiflowError::Precondition("recipients CSV has no rows".to_string())
        })?,
        None => Recipient::new(
            "preview@certiflow.test",
            HashMap::from([("Name".to_string(), "Sample Recipient".to_string())]),
        ),
    };

    let artifact = render::render(
        &template,
        &project.fields,
        &recipient.data,
        &recipient.cert_id,
    )?;
    std::fs::write(out, &artifact)?;
    println!("Rendered {} ({} bytes)", out.display(), artifact.len());
    Ok(())
}

async fn run_campaign(
    project_path: &Path,
    template_path: &Path,
    recipients_path: &Path,
    dry_run: bool,
    retry_failed: bool,
    limit: u32,
) -> Result<(), CertiflowError> {
    let mut project = load_project(project_path)?;
    let template_bytes = std::fs::read(template_path)?;
    project.template_kind = Some(template_kind(template_path));

    // A fresh recipient list replaces whatever the project file carried,
    // unless this is a retry of the recorded failures.
    if !retry_failed {
        project.recipients = load_recipients(recipients_path)?;
    }

    let transport: Box<dyn MessageTransport> = if dry_run {
        Box::new(MockTransport::new())
    } else {
        Box::new(SmtpTransport::new(&SmtpRelayConfig::from_env()?)?)
    };
    let quota = MemoryQuotaStore::new(limit);
    let audit = MemoryAuditLog::new();

    let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(100);
    let progress = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                RunEvent::Progress { done, total, percent } => {
                    println!("[{percent:>3}%] {done}/{total} processed");
                }
                RunEvent::Delivered { email } => println!("  sent     {email}"),
                RunEvent::Failed { email, reason } => println!("  FAILED   {email}: {reason}"),
            }
        }
    });

    let runner =
        CampaignRunner::new(transport.as_ref(), &quota, &audit).with_events(events_tx);
    let outcome = if retry_failed {
        runner
            .retry_failed(&mut project, "cli", &template_bytes)
            .await?
    } else {
        runner
            .run(&mut project, "cli", &template_bytes, RunSelection::All)
            .await?
    };
    // The runner owns the event sender; drop it so the progress task sees
    // the channel close.
    drop(runner);
    let _ = progress.await;

    // Persist updated statuses and stats back to the project file.
    std::fs::write(
        project_path,
        serde_json::to_string_pretty(&project)
            .map_err(|e| CertiflowError::Precondition(format!("cannot serialize project: {e}")))?,
    )?;

    println!(
        "Done: {} sent, {} failed ({} processed)",
        outcome.sent, outcome.failed, outcome.processed
    );
    Ok(())
}
