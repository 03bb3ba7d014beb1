pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod providers;
pub mod realtime;
pub mod services;
pub mod startup;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::ports::LedgerStore;
use crate::providers::ProviderRegistry;
use crate::realtime::RealtimeHub;
use crate::services::{DonationIntake, ReconciliationEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn LedgerStore>,
    /// Present when backed by Postgres; used for pool stats on /health.
    pub pool: Option<sqlx::PgPool>,
    pub providers: ProviderRegistry,
    pub intake: DonationIntake,
    pub engine: ReconciliationEngine,
    pub realtime: RealtimeHub,
}

pub fn create_app(state: AppState) -> Router {
    let admin = handlers::admin::admin_routes().layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::auth::admin_auth,
    ));

    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/donations/:provider", post(handlers::donations::create_donation))
        .route("/transactions/:id", get(handlers::donations::get_transaction))
        .route("/webhooks/zalopay", post(handlers::webhook::zalopay_webhook))
        .route("/webhooks/payos", post(handlers::webhook::payos_webhook))
        .route("/ws/campaigns/:id", get(handlers::ws::campaign_ws))
        .route("/ws/notifications", get(handlers::ws::notifications_ws))
        .nest("/admin", admin)
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match allowed_origins {
        None | Some("*") => base.allow_origin(Any),
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect();
            base.allow_origin(AllowOrigin::list(origins))
        }
    }
}
