//! Wires configuration, storage and collaborators into an [`AppState`].

use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::PostgresLedgerStore;
use crate::config::Config;
use crate::ports::LedgerStore;
use crate::providers::{PayOs, ProviderRegistry, ZaloPay};
use crate::realtime::RealtimeHub;
use crate::services::{
    DonationIntake, DonorProjector, EventFanout, HttpAutomationHook, HttpContentGenerator,
    HttpMailRelay, ReceiptMailer, ReconciliationEngine,
};
use crate::AppState;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new("./migrations"))
        .await
        .context("Failed to load migrations")?;
    migrator.run(pool).await.context("Failed to run migrations")?;
    tracing::info!("Database migrations completed");
    Ok(())
}

pub fn provider_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    if let Some(zalopay) = &config.zalopay {
        registry.register(Arc::new(ZaloPay::new(zalopay.clone())));
        tracing::info!(app_id = %zalopay.app_id, "ZaloPay enabled");
    }
    if let Some(payos) = &config.payos {
        registry.register(Arc::new(PayOs::new(payos.clone())));
        tracing::info!(client_id = %payos.client_id, "PayOS enabled");
    }
    if registry.enabled().is_empty() {
        tracing::warn!("No payment provider configured; donation intake will reject every request");
    }
    registry
}

/// Builds the application state over any ledger store. The realtime hub is
/// created here and shared by the fanout and the WebSocket handlers.
pub fn build_state(
    config: Config,
    store: Arc<dyn LedgerStore>,
    pool: Option<PgPool>,
    providers: ProviderRegistry,
) -> AppState {
    let realtime = RealtimeHub::new();
    let timeout = config.side_effect_timeout;

    let mailer: Option<Arc<dyn ReceiptMailer>> = config.mail_relay_url.as_ref().map(|url| {
        Arc::new(HttpMailRelay::new(url.clone(), config.mail_from.clone(), timeout))
            as Arc<dyn ReceiptMailer>
    });
    let projector = DonorProjector::new(store.clone(), mailer);

    let mut fanout = EventFanout::new(
        store.clone(),
        realtime.clone(),
        projector,
        timeout,
        config.frontend_url.clone(),
    );
    let generation_budget = fanout.generation_budget();
    if let Some(url) = &config.automation_hook_url {
        fanout = fanout.with_automation_hook(Arc::new(HttpAutomationHook::new(
            url.clone(),
            timeout - generation_budget,
        )));
    }
    if let Some(url) = &config.content_generator_url {
        fanout = fanout.with_content_generator(Arc::new(HttpContentGenerator::new(
            url.clone(),
            config.content_generator_key.clone(),
            generation_budget,
        )));
    }

    let engine = ReconciliationEngine::new(store.clone(), fanout);
    let intake = DonationIntake::new(store.clone(), providers.clone(), config.min_donation_amount);

    AppState {
        config: Arc::new(config),
        store,
        pool,
        providers,
        intake,
        engine,
        realtime,
    }
}

pub async fn build_postgres_state(config: Config) -> anyhow::Result<AppState> {
    let pool = create_pool(&config)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await?;

    let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool.clone()));
    let providers = provider_registry(&config);
    Ok(build_state(config, store, Some(pool), providers))
}
