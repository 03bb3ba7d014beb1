//! ZaloPay gateway: query-string order creation and `{data, mac}` callbacks.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    hmac_sha256_hex, random_digits, verify_hmac_sha256_hex, CheckoutPayload, OrderDraft,
    PaymentProvider, ProviderError, ProviderEvent, VerificationError, WebhookAck,
};
use crate::domain::{PaymentOutcome, ProviderKind, VerifiedEvent};

#[derive(Debug, Clone)]
pub struct ZaloPayConfig {
    pub app_id: String,
    /// Signs outbound orders.
    pub key1: String,
    /// Verifies callbacks.
    pub key2: String,
    pub endpoint: String,
    pub callback_url: String,
    pub redirect_base_url: String,
    pub minimum_amount: i64,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct ZaloPay {
    client: Client,
    config: ZaloPayConfig,
}

#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    data: String,
    mac: String,
}

#[derive(Debug, Deserialize)]
struct CallbackData {
    app_trans_id: String,
    amount: i64,
    app_time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZaloPayEvent {
    pub app_trans_id: String,
    pub amount: i64,
    /// Milliseconds since the epoch.
    pub app_time: i64,
    pub raw: serde_json::Value,
}

impl From<ZaloPayEvent> for VerifiedEvent {
    fn from(e: ZaloPayEvent) -> Self {
        VerifiedEvent {
            provider_order_code: e.app_trans_id,
            amount: e.amount,
            outcome: PaymentOutcome::Paid,
            raw_provider_fields: e.raw,
            occurred_at: Utc
                .timestamp_millis_opt(e.app_time)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    return_code: i64,
    #[serde(default)]
    return_message: Option<String>,
    #[serde(default)]
    sub_return_message: Option<String>,
    #[serde(default)]
    order_url: Option<String>,
    #[serde(default)]
    qr_code: Option<String>,
}

impl ZaloPay {
    pub fn new(config: ZaloPayConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// `app_id|app_trans_id|app_user|amount|app_time|embed_data|item`
    fn order_mac_input(
        &self,
        order_code: &str,
        app_user: &str,
        amount: i64,
        app_time: i64,
        embed_data: &str,
        item: &str,
    ) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.config.app_id, order_code, app_user, amount, app_time, embed_data, item
        )
    }
}

#[async_trait]
impl PaymentProvider for ZaloPay {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ZaloPay
    }

    fn minimum_amount(&self) -> i64 {
        self.config.minimum_amount
    }

    fn next_order_code(&self) -> String {
        format!("{}_{:06}", Utc::now().format("%y%m%d"), random_digits())
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<CheckoutPayload, ProviderError> {
        let app_time = Utc::now().timestamp_millis();
        let campaign_segment = draft
            .campaign_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "general".to_string());
        let embed_data = json!({
            "redirecturl": format!(
                "{}/{}",
                self.config.redirect_base_url.trim_end_matches('/'),
                campaign_segment
            ),
            "donationCampaignId": draft.campaign_id,
            "userId": draft.donor_id,
        })
        .to_string();
        let item = json!([{ "name": "Campaign donation", "amount": draft.amount }]).to_string();
        let app_user = if draft.donor_name.is_empty() {
            "anonymous-donor"
        } else {
            draft.donor_name.as_str()
        };

        let mac = hmac_sha256_hex(
            &self.config.key1,
            &self.order_mac_input(
                &draft.order_code,
                app_user,
                draft.amount,
                app_time,
                &embed_data,
                &item,
            ),
        )?;

        let params = [
            ("app_id", self.config.app_id.clone()),
            ("app_trans_id", draft.order_code.clone()),
            ("app_user", app_user.to_string()),
            ("app_time", app_time.to_string()),
            ("item", item),
            ("embed_data", embed_data),
            ("amount", draft.amount.to_string()),
            ("description", draft.description.clone()),
            ("bank_code", String::new()),
            ("callback_url", self.config.callback_url.clone()),
            ("mac", mac),
        ];

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let raw: serde_json::Value = response.json().await?;
        let parsed: CreateOrderResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if parsed.return_code != 1 {
            return Err(ProviderError::Rejected(
                parsed
                    .sub_return_message
                    .or(parsed.return_message)
                    .unwrap_or_else(|| format!("return_code {}", parsed.return_code)),
            ));
        }

        Ok(CheckoutPayload {
            redirect_url: parsed.order_url,
            qr_code: parsed.qr_code,
            provider_data: raw,
        })
    }

    fn verify(&self, raw_body: &[u8], _headers: &HeaderMap) -> Result<ProviderEvent, VerificationError> {
        let envelope: CallbackEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;

        if !verify_hmac_sha256_hex(&self.config.key2, &envelope.data, &envelope.mac) {
            return Err(VerificationError::SignatureMismatch);
        }

        let raw: serde_json::Value = serde_json::from_str(&envelope.data)
            .map_err(|e| VerificationError::Malformed(format!("data is not JSON: {}", e)))?;
        let data: CallbackData = serde_json::from_value(raw.clone())
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;

        if data.amount <= 0 {
            return Err(VerificationError::Malformed(format!(
                "non-positive amount {}",
                data.amount
            )));
        }

        Ok(ProviderEvent::ZaloPay(ZaloPayEvent {
            app_trans_id: data.app_trans_id,
            amount: data.amount,
            app_time: data.app_time,
            raw,
        }))
    }

    fn acknowledgement(&self, ack: &WebhookAck) -> serde_json::Value {
        match ack {
            WebhookAck::Accepted => json!({ "return_code": 1, "return_message": "success" }),
            WebhookAck::Rejected(reason) => json!({ "return_code": -1, "return_message": reason }),
            // 0 asks ZaloPay to call back again later
            WebhookAck::Retry(reason) => json!({ "return_code": 0, "return_message": reason }),
        }
    }
}
