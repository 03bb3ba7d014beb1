mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{campaign, memory_state, spawn_app, test_config};
use donation_ledger::create_app;
use donation_ledger::domain::{ProviderKind, TransactionStatus};

const ZALOPAY_OK: &str =
    r#"{"return_code":1,"return_message":"Giao dịch thành công","order_url":"https://sbgateway.zalopay.vn/openinapp?order=1","qr_code":"00020101"}"#;

#[tokio::test]
async fn test_below_minimum_is_rejected_without_transaction() {
    let mut server = mockito::Server::new_async().await;
    let provider = server
        .mock("POST", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (state, store) = memory_state(test_config(&server.url()));
    let app = spawn_app(create_app(state)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/donations/zalopay", app))
        .json(&json!({ "amount": 500, "donorDisplayName": "Hoa" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 400);
    assert_eq!(store.transaction_count().await, 0);
    provider.assert_async().await;
}

#[tokio::test]
async fn test_missing_amount_is_rejected() {
    let (state, store) = memory_state(test_config("http://unused"));
    let app = spawn_app(create_app(state)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/donations/payos", app))
        .json(&json!({ "message": "no amount" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.transaction_count().await, 0);
}

#[tokio::test]
async fn test_unknown_campaign_is_not_found() {
    let (state, store) = memory_state(test_config("http://unused"));
    let app = spawn_app(create_app(state)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/donations/zalopay", app))
        .json(&json!({ "amount": 5000, "campaignRef": uuid::Uuid::new_v4() }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.transaction_count().await, 0);
}

#[tokio::test]
async fn test_unknown_provider_is_not_found() {
    let (state, _store) = memory_state(test_config("http://unused"));
    let app = spawn_app(create_app(state)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/donations/momo", app))
        .json(&json!({ "amount": 5000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disabled_provider_is_bad_request() {
    let mut config = test_config("http://unused");
    config.payos = None;
    let (state, _store) = memory_state(config);
    let app = spawn_app(create_app(state)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/donations/payos", app))
        .json(&json!({ "amount": 5000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_successful_intake_records_pending_transaction() {
    let mut server = mockito::Server::new_async().await;
    let _provider = server
        .mock("POST", "/v2/create")
        .match_query(mockito::Matcher::UrlEncoded("amount".into(), "50000".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ZALOPAY_OK)
        .create_async()
        .await;

    let (state, store) = memory_state(test_config(&server.url()));
    let c = campaign(10_000_000, 0);
    store.insert_campaign(c.clone()).await;
    let app = spawn_app(create_app(state)).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/donations/zalopay", app))
        .json(&json!({
            "campaignRef": c.id,
            "amount": 50000,
            "donorDisplayName": "Pham Minh",
            "message": "For the families",
            "contact": "minh@example.com"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let checkout: Value = res.json().await.unwrap();
    assert_eq!(checkout["provider"], "zalopay");
    assert_eq!(checkout["redirectUrl"], "https://sbgateway.zalopay.vn/openinapp?order=1");
    assert_eq!(checkout["qrCode"], "00020101");

    let transactions = store.transactions().await;
    assert_eq!(transactions.len(), 1);
    let tx = &transactions[0];
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.provider, ProviderKind::ZaloPay);
    assert_eq!(tx.donor_name, "Pham Minh");
    assert_eq!(tx.contact.as_deref(), Some("minh@example.com"));
    assert_eq!(checkout["providerOrderCode"], tx.provider_order_code);

    let fetched: Value = client
        .get(format!("{}/transactions/{}", app, tx.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "pending");
    assert!(fetched.get("contact").is_none());
}

#[tokio::test]
async fn test_authenticated_anonymous_donor_is_hidden() {
    let mut server = mockito::Server::new_async().await;
    let _provider = server
        .mock("POST", "/v2/payment-requests")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":"00","desc":"success","data":{"checkoutUrl":"https://pay.payos.vn/web/1","qrCode":"0002"}}"#)
        .create_async()
        .await;

    let (state, store) = memory_state(test_config(&server.url()));
    let app = spawn_app(create_app(state)).await;
    let donor_id = uuid::Uuid::new_v4();

    let res = reqwest::Client::new()
        .post(format!("{}/donations/payos", app))
        .header("x-donor-id", donor_id.to_string())
        .header("x-donor-name", "Vo Thi D")
        .header("x-donor-email", "d@example.com")
        .json(&json!({ "amount": 20000, "anonymous": true }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let tx = store.transactions().await.remove(0);
    assert_eq!(tx.donor_id, Some(donor_id));
    assert_eq!(tx.donor_name, "Anonymous donor");
    assert!(tx.is_anonymous);
    assert_eq!(tx.contact.as_deref(), Some("d@example.com"));
    assert!(tx.provider_order_code.parse::<i64>().is_ok());
}

#[tokio::test]
async fn test_provider_failure_marks_transaction_failed() {
    let mut server = mockito::Server::new_async().await;
    let _provider = server
        .mock("POST", "/v2/create")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let (state, store) = memory_state(test_config(&server.url()));
    let app = spawn_app(create_app(state)).await;

    let res = reqwest::Client::new()
        .post(format!("{}/donations/zalopay", app))
        .json(&json!({ "amount": 10000 }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let transactions = store.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].status, TransactionStatus::Failed);
}
