use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use donation_ledger::cli::{Cli, Commands, DbCommands, ReconcileCommands};
use donation_ledger::{cli, config, create_app, startup};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Cli::parse();
    let config = config::Config::from_env()?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Reconcile(ReconcileCommands::Report { output, all }) => {
            cli::handle_reconcile_report(&config, output, all).await
        }
        Commands::Reconcile(ReconcileCommands::Resolve { id, note }) => {
            cli::handle_reconcile_resolve(&config, id, &note).await
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing() {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(config: config::Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    // every fanout channel is bounded by the side-effect timeout
    let drain_limit = config.side_effect_timeout + Duration::from_secs(1);
    let state = startup::build_postgres_state(config).await?;
    let engine = state.engine.clone();
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let pending = engine.fanout().in_flight();
    if pending > 0 {
        tracing::info!(pending, "Waiting for side-effect tasks before exit");
        engine.fanout().drain(drain_limit).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
