//! Payment gateway adapters.
//!
//! Each adapter opens remote orders and authenticates inbound callbacks.
//! Callback payloads are parsed into a provider-tagged [`ProviderEvent`] and
//! immediately normalized into a [`VerifiedEvent`], so nothing downstream
//! branches on which gateway sent the money.

pub mod payos;
pub mod zalopay;

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ProviderKind, VerifiedEvent};

pub use payos::{PayOs, PayOsConfig, PayOsEvent};
pub use zalopay::{ZaloPay, ZaloPayConfig, ZaloPayEvent};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Provider rejected order: {0}")]
    Rejected(String),
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Authenticity failures. Both variants are answered with the provider's
/// rejection code and never reach the ledger.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// What the adapter needs to open a remote order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_code: String,
    pub amount: i64,
    pub donor_name: String,
    pub donor_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    pub description: String,
}

/// Redirect URL and/or QR payload handed back to the donor's client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    pub redirect_url: Option<String>,
    pub qr_code: Option<String>,
    pub provider_data: serde_json::Value,
}

/// Provider-specific callback, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    ZaloPay(ZaloPayEvent),
    PayOs(PayOsEvent),
}

impl From<ProviderEvent> for VerifiedEvent {
    fn from(event: ProviderEvent) -> Self {
        match event {
            ProviderEvent::ZaloPay(e) => e.into(),
            ProviderEvent::PayOs(e) => e.into(),
        }
    }
}

/// Acknowledgement categories; each adapter renders its own body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAck {
    Accepted,
    Rejected(String),
    Retry(String),
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Smallest amount, in minor units, the gateway accepts.
    fn minimum_amount(&self) -> i64;

    fn next_order_code(&self) -> String;

    async fn create_order(&self, draft: &OrderDraft) -> Result<CheckoutPayload, ProviderError>;

    fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> Result<ProviderEvent, VerificationError>;

    fn parse_webhook(
        &self,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> Result<VerifiedEvent, VerificationError> {
        self.verify(raw_body, headers).map(VerifiedEvent::from)
    }

    fn acknowledgement(&self, ack: &WebhookAck) -> serde_json::Value;
}

/// Enabled gateways, owned by the application state.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) -> &mut Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&kind).cloned()
    }

    pub fn enabled(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

pub fn hmac_sha256_hex(key: &str, data: &str) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| ProviderError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a hex signature against the HMAC of `data`.
pub fn verify_hmac_sha256_hex(key: &str, data: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(data.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Six pseudo-random digits taken from a v4 UUID.
pub(crate) fn random_digits() -> u32 {
    (Uuid::new_v4().as_u128() % 1_000_000) as u32
}
