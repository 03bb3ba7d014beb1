mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{memory_state, spawn_app, test_config, ADMIN_KEY};
use donation_ledger::create_app;
use donation_ledger::domain::{IssueKind, ReconciliationIssue};
use donation_ledger::ports::IssueRepository;

async fn seeded() -> (String, ReconciliationIssue) {
    let (state, store) = memory_state(test_config("http://unused"));
    let issue = ReconciliationIssue::open(
        Uuid::new_v4(),
        "261018_000321",
        Some(Uuid::new_v4()),
        75_000,
        IssueKind::PartialCredit,
        "Storage unavailable: connection reset during increment",
    );
    store.record_issue(&issue).await.unwrap();
    (spawn_app(create_app(state)).await, issue)
}

#[tokio::test]
async fn test_admin_routes_require_bearer_key() {
    let (app, _) = seeded().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/admin/reconciliation/issues", app))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/admin/reconciliation/issues", app))
        .header("Authorization", "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_export_and_resolve() {
    let (app, issue) = seeded().await;
    let client = reqwest::Client::new();
    let bearer = format!("Bearer {}", ADMIN_KEY);

    let open: Vec<Value> = client
        .get(format!("{}/admin/reconciliation/issues", app))
        .header("Authorization", &bearer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["kind"], "partial_credit");
    assert_eq!(open[0]["providerOrderCode"], "261018_000321");

    let res = client
        .get(format!("{}/admin/reconciliation/issues.csv", app))
        .header("Authorization", &bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/csv");
    let csv = res.text().await.unwrap();
    assert!(csv.contains("261018_000321"));

    let res = client
        .post(format!("{}/admin/reconciliation/issues/{}/resolve", app, issue.id))
        .header("Authorization", &bearer)
        .json(&json!({ "note": "credited 75000 by hand" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let resolved: Value = res.json().await.unwrap();
    assert_eq!(resolved["resolved"], true);

    let open: Vec<Value> = client
        .get(format!("{}/admin/reconciliation/issues", app))
        .header("Authorization", &bearer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn test_resolving_unknown_issue_is_not_found() {
    let (app, _) = seeded().await;
    let res = reqwest::Client::new()
        .post(format!("{}/admin/reconciliation/issues/{}/resolve", app, Uuid::new_v4()))
        .header("Authorization", format!("Bearer {}", ADMIN_KEY))
        .json(&json!({ "note": "n/a" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
