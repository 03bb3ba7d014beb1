use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::PostgresLedgerStore;
use crate::config::Config;
use crate::ports::IssueRepository;
use crate::services::report::write_issues_csv;

#[derive(Parser)]
#[command(name = "donation-ledger")]
#[command(about = "Donation Ledger - payment webhook reconciliation service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Operator reconciliation commands
    #[command(subcommand)]
    Reconcile(ReconcileCommands),

    /// Print the effective configuration with secrets masked
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum ReconcileCommands {
    /// Write reconciliation issues as CSV
    Report {
        /// Output file; stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include issues already resolved
        #[arg(long)]
        all: bool,
    },

    /// Mark an issue as resolved
    Resolve {
        /// Issue UUID
        #[arg(value_name = "ISSUE_ID")]
        id: Uuid,

        /// What the operator did to repair the ledger
        #[arg(short, long)]
        note: String,
    },
}

async fn connect(config: &Config) -> anyhow::Result<Arc<PostgresLedgerStore>> {
    let pool = crate::startup::create_pool(config).await?;
    Ok(Arc::new(PostgresLedgerStore::new(pool)))
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::startup::create_pool(config).await?;
    tracing::info!("Running database migrations...");
    crate::startup::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_reconcile_report(
    config: &Config,
    output: Option<PathBuf>,
    include_resolved: bool,
) -> anyhow::Result<()> {
    let store = connect(config).await?;
    export_report(store.as_ref(), output, include_resolved).await
}

/// Writes the report from any issue store, to a file or stdout.
pub async fn export_report(
    store: &dyn IssueRepository,
    output: Option<PathBuf>,
    include_resolved: bool,
) -> anyhow::Result<()> {
    let issues = store.list_issues(include_resolved).await?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            write_issues_csv(&issues, file)?;
            println!("✓ Wrote {} issue(s) to {}", issues.len(), path.display());
        }
        None => write_issues_csv(&issues, std::io::stdout())?,
    }

    if !issues.is_empty() {
        tracing::warn!(count = issues.len(), "Reconciliation issues need operator attention");
    }
    Ok(())
}

pub async fn handle_reconcile_resolve(config: &Config, id: Uuid, note: &str) -> anyhow::Result<()> {
    let store = connect(config).await?;
    resolve(store.as_ref(), id, note).await
}

pub async fn resolve(store: &dyn IssueRepository, id: Uuid, note: &str) -> anyhow::Result<()> {
    if note.trim().is_empty() {
        anyhow::bail!("--note must not be empty");
    }
    let issue = store.resolve_issue(id, note.trim()).await?;
    tracing::info!(issue_id = %id, "Reconciliation issue resolved");
    println!(
        "✓ Issue {} ({} for order {}) marked as resolved",
        issue.id, issue.kind, issue.provider_order_code
    );
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Minimum Donation: {}", config.min_donation_amount);
    println!("  Side-effect Timeout: {}s", config.side_effect_timeout.as_secs());
    println!("  Frontend URL: {}", config.frontend_url);
    println!("  Public Base URL: {}", config.public_base_url);
    println!("  ZaloPay: {}", enabled(config.zalopay.is_some()));
    println!("  PayOS: {}", enabled(config.payos.is_some()));
    println!("  Admin API: {}", enabled(config.admin_api_key.is_some()));
    println!("  Automation Hook: {}", enabled(config.automation_hook_url.is_some()));
    println!("  Content Generator: {}", enabled(config.content_generator_url.is_some()));
    println!("  Mail Relay: {}", enabled(config.mail_relay_url.is_some()));

    println!("✓ Configuration is valid");
    Ok(())
}

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
