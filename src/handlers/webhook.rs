//! Provider callbacks. Every response is HTTP 200; the outcome travels in
//! the provider's own acknowledgement body.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::domain::ProviderKind;
use crate::providers::WebhookAck;
use crate::services::ReconcileError;
use crate::AppState;

pub async fn zalopay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    Json(handle_webhook(&state, ProviderKind::ZaloPay, &headers, &body).await)
}

pub async fn payos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    Json(handle_webhook(&state, ProviderKind::PayOs, &headers, &body).await)
}

async fn handle_webhook(
    state: &AppState,
    kind: ProviderKind,
    headers: &HeaderMap,
    body: &[u8],
) -> serde_json::Value {
    let Some(provider) = state.providers.get(kind) else {
        tracing::warn!(provider = %kind, "Webhook for a provider that is not enabled");
        return json!({ "error": 1, "message": "provider not enabled" });
    };

    let event = match provider.parse_webhook(body, headers) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(provider = %kind, error = %e, "Webhook verification failed");
            return provider.acknowledgement(&WebhookAck::Rejected(e.to_string()));
        }
    };

    let ack = match state.engine.reconcile(&event).await {
        Ok(_) => WebhookAck::Accepted,
        Err(ReconcileError::Duplicate { .. }) | Err(ReconcileError::NotFound(_)) => {
            WebhookAck::Accepted
        }
        // Flagged for the operator; a provider retry cannot repair it.
        Err(ReconcileError::PartialCredit { .. }) => WebhookAck::Accepted,
        Err(ReconcileError::Storage(e)) => {
            tracing::error!(
                provider = %kind,
                order_code = %event.provider_order_code,
                error = %e,
                "Ledger unavailable while reconciling"
            );
            WebhookAck::Retry("temporarily unavailable".to_string())
        }
    };

    provider.acknowledgement(&ack)
}
