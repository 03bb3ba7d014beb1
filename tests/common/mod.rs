#![allow(dead_code)]

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use donation_ledger::adapters::MemoryLedgerStore;
use donation_ledger::config::Config;
use donation_ledger::domain::{
    CampaignAggregate, NewTransaction, PaymentOutcome, ProviderKind, Transaction, VerifiedEvent,
};
use donation_ledger::ports::TransactionRepository;
use donation_ledger::providers::{
    hmac_sha256_hex, PayOsConfig, ProviderRegistry, ZaloPayConfig,
};
use donation_ledger::startup::{build_state, provider_registry};
use donation_ledger::AppState;

pub const ZALOPAY_KEY2: &str = "test-key2";
pub const PAYOS_CHECKSUM: &str = "test-checksum";
pub const ADMIN_KEY: &str = "test-admin-key";

pub fn test_config(provider_endpoint: &str) -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://unused".to_string(),
        min_donation_amount: 1000,
        side_effect_timeout: Duration::from_secs(2),
        frontend_url: "https://relief.example".to_string(),
        public_base_url: "https://api.relief.example".to_string(),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        cors_allowed_origins: None,
        zalopay: Some(ZaloPayConfig {
            app_id: "2553".to_string(),
            key1: "test-key1".to_string(),
            key2: ZALOPAY_KEY2.to_string(),
            endpoint: format!("{}/v2/create", provider_endpoint),
            callback_url: "https://api.relief.example/webhooks/zalopay".to_string(),
            redirect_base_url: "https://relief.example/donate".to_string(),
            minimum_amount: 1000,
            timeout: Duration::from_secs(2),
        }),
        payos: Some(PayOsConfig {
            client_id: "client".to_string(),
            api_key: "api".to_string(),
            checksum_key: PAYOS_CHECKSUM.to_string(),
            endpoint: provider_endpoint.to_string(),
            return_url: "https://relief.example/donate/success".to_string(),
            cancel_url: "https://relief.example/donate/cancel".to_string(),
            minimum_amount: 1000,
            timeout: Duration::from_secs(2),
        }),
        automation_hook_url: None,
        content_generator_url: None,
        content_generator_key: None,
        mail_relay_url: None,
        mail_from: "no-reply@relief.example".to_string(),
    }
}

pub fn memory_state(config: Config) -> (AppState, Arc<MemoryLedgerStore>) {
    let store = Arc::new(MemoryLedgerStore::new());
    let providers: ProviderRegistry = provider_registry(&config);
    let state = build_state(config, store.clone(), None, providers);
    (state, store)
}

pub fn campaign(goal: i64, current: i64) -> CampaignAggregate {
    CampaignAggregate {
        id: Uuid::new_v4(),
        title: "Flood relief Quang Binh".to_string(),
        goal_amount: goal,
        current_amount: current,
        owner_id: Some(Uuid::new_v4()),
        thumbnail: Some("https://cdn.relief.example/flood.jpg".to_string()),
    }
}

pub async fn pending(
    store: &MemoryLedgerStore,
    campaign_id: Option<Uuid>,
    donor_id: Option<Uuid>,
    amount: i64,
) -> Transaction {
    let tx = Transaction::pending(NewTransaction {
        campaign_id,
        donor_id,
        donor_name: "Tran Thi B".to_string(),
        is_anonymous: false,
        amount,
        message: Some("Stay strong".to_string()),
        contact: None,
        provider: ProviderKind::ZaloPay,
        provider_order_code: format!("261018_{}", Uuid::new_v4().simple()),
    });
    store.insert_pending(&tx).await.unwrap()
}

pub fn paid(tx: &Transaction) -> VerifiedEvent {
    paid_amount(tx, tx.amount)
}

pub fn paid_amount(tx: &Transaction, amount: i64) -> VerifiedEvent {
    VerifiedEvent {
        provider_order_code: tx.provider_order_code.clone(),
        amount,
        outcome: PaymentOutcome::Paid,
        raw_provider_fields: json!({}),
        occurred_at: Utc::now(),
    }
}

pub fn zalopay_callback(key2: &str, order_code: &str, amount: i64) -> String {
    let data = json!({
        "app_id": 2553,
        "app_trans_id": order_code,
        "app_time": Utc::now().timestamp_millis(),
        "amount": amount,
        "embed_data": "{}",
        "zp_trans_id": 240101000001i64,
    })
    .to_string();
    let mac = hmac_sha256_hex(key2, &data).unwrap();
    json!({ "data": data, "mac": mac, "type": 1 }).to_string()
}

/// Serves the router on an ephemeral port and returns its base URL.
pub async fn spawn_app(app: axum::Router) -> String {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    let actual_addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    format!("http://{}", actual_addr)
}
