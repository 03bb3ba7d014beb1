//! PayOS gateway: JSON payment requests and checksum-signed webhook envelopes.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    hmac_sha256_hex, verify_hmac_sha256_hex, CheckoutPayload, OrderDraft, PaymentProvider,
    ProviderError, ProviderEvent, VerificationError, WebhookAck,
};
use crate::domain::{PaymentOutcome, ProviderKind, VerifiedEvent};

const DESCRIPTION_LIMIT: usize = 25;
const PAID_CODE: &str = "00";

#[derive(Debug, Clone)]
pub struct PayOsConfig {
    pub client_id: String,
    pub api_key: String,
    pub checksum_key: String,
    pub endpoint: String,
    pub return_url: String,
    pub cancel_url: String,
    pub minimum_amount: i64,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct PayOs {
    client: Client,
    config: PayOsConfig,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    code: Option<String>,
    data: Value,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    order_code: i64,
    amount: i64,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    transaction_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayOsEvent {
    pub order_code: i64,
    pub amount: i64,
    pub paid: bool,
    pub transaction_date_time: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl From<PayOsEvent> for VerifiedEvent {
    fn from(e: PayOsEvent) -> Self {
        VerifiedEvent {
            provider_order_code: e.order_code.to_string(),
            amount: e.amount,
            outcome: if e.paid {
                PaymentOutcome::Paid
            } else {
                PaymentOutcome::Failed
            },
            raw_provider_fields: e.raw,
            occurred_at: e.transaction_date_time.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequest<'a> {
    order_code: i64,
    amount: i64,
    description: &'a str,
    buyer_name: &'a str,
    cancel_url: &'a str,
    return_url: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    code: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    data: Option<PaymentResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponseData {
    #[serde(default)]
    checkout_url: Option<String>,
    #[serde(default)]
    qr_code: Option<String>,
}

impl PayOs {
    pub fn new(config: PayOsConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn request_signature_input(&self, order_code: i64, amount: i64, description: &str) -> String {
        format!(
            "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
            amount, self.config.cancel_url, description, order_code, self.config.return_url
        )
    }
}

/// Canonical `key=value&...` rendering of the webhook `data` object, keys in
/// alphabetical order.
pub fn canonical_data_string(data: &serde_json::Map<String, Value>) -> String {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| {
            let value = match &data[key] {
                Value::Null => String::new(),
                Value::String(s) if s == "null" || s == "undefined" => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// `transactionDateTime` is local Vietnam time, `YYYY-MM-DD HH:MM:SS`.
fn parse_transaction_time(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(7 * 3600)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate_description(description: &str) -> String {
    description.chars().take(DESCRIPTION_LIMIT).collect()
}

#[async_trait]
impl PaymentProvider for PayOs {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PayOs
    }

    fn minimum_amount(&self) -> i64 {
        self.config.minimum_amount
    }

    fn next_order_code(&self) -> String {
        let suffix = super::random_digits() % 1000;
        (Utc::now().timestamp_millis() * 1000 + suffix as i64).to_string()
    }

    async fn create_order(&self, draft: &OrderDraft) -> Result<CheckoutPayload, ProviderError> {
        let order_code: i64 = draft
            .order_code
            .parse()
            .map_err(|_| ProviderError::Signing(format!("order code {} is not numeric", draft.order_code)))?;
        let description = truncate_description(&draft.description);
        let signature = hmac_sha256_hex(
            &self.config.checksum_key,
            &self.request_signature_input(order_code, draft.amount, &description),
        )?;

        let body = PaymentRequest {
            order_code,
            amount: draft.amount,
            description: &description,
            buyer_name: &draft.donor_name,
            cancel_url: &self.config.cancel_url,
            return_url: &self.config.return_url,
            signature,
        };

        let url = format!(
            "{}/v2/payment-requests",
            self.config.endpoint.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .header("x-client-id", &self.config.client_id)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let raw: Value = response.json().await?;
        let parsed: PaymentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if parsed.code != PAID_CODE {
            return Err(ProviderError::Rejected(
                parsed
                    .desc
                    .unwrap_or_else(|| format!("code {}", parsed.code)),
            ));
        }

        let data = parsed
            .data
            .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))?;

        Ok(CheckoutPayload {
            redirect_url: data.checkout_url,
            qr_code: data.qr_code,
            provider_data: raw.get("data").cloned().unwrap_or(Value::Null),
        })
    }

    fn verify(&self, raw_body: &[u8], _headers: &HeaderMap) -> Result<ProviderEvent, VerificationError> {
        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;

        let Value::Object(map) = &envelope.data else {
            return Err(VerificationError::Malformed("data is not an object".to_string()));
        };

        if !verify_hmac_sha256_hex(
            &self.config.checksum_key,
            &canonical_data_string(map),
            &envelope.signature,
        ) {
            return Err(VerificationError::SignatureMismatch);
        }

        let data: WebhookData = serde_json::from_value(envelope.data.clone())
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;

        if data.amount <= 0 {
            return Err(VerificationError::Malformed(format!(
                "non-positive amount {}",
                data.amount
            )));
        }

        // data.code is the payment result; the envelope code only mirrors it
        let code = data.code.or(envelope.code);

        Ok(ProviderEvent::PayOs(PayOsEvent {
            order_code: data.order_code,
            amount: data.amount,
            paid: code.as_deref() == Some(PAID_CODE),
            transaction_date_time: data
                .transaction_date_time
                .as_deref()
                .and_then(parse_transaction_time),
            raw: envelope.data,
        }))
    }

    fn acknowledgement(&self, ack: &WebhookAck) -> Value {
        match ack {
            WebhookAck::Accepted => json!({ "error": 0, "message": "Ok" }),
            WebhookAck::Rejected(reason) => json!({ "error": 1, "message": reason }),
            WebhookAck::Retry(reason) => json!({ "error": 1, "message": reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(endpoint: &str) -> PayOs {
        PayOs::new(PayOsConfig {
            client_id: "client".to_string(),
            api_key: "api".to_string(),
            checksum_key: "checksum-secret".to_string(),
            endpoint: endpoint.to_string(),
            return_url: "https://relief.example/donate/success".to_string(),
            cancel_url: "https://relief.example/donate/cancel".to_string(),
            minimum_amount: 1000,
            timeout: Duration::from_secs(5),
        })
    }

    fn signed_envelope(key: &str, data: Value) -> Vec<u8> {
        let signature = hmac_sha256_hex(key, &canonical_data_string(data.as_object().unwrap())).unwrap();
        json!({
            "code": "00",
            "desc": "success",
            "success": true,
            "data": data,
            "signature": signature
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_canonical_string_sorts_keys_and_blanks_nulls() {
        let data = json!({
            "orderCode": 123,
            "amount": 3000,
            "description": "VQRIO123",
            "counterAccountName": null,
            "code": "00"
        });
        assert_eq!(
            canonical_data_string(data.as_object().unwrap()),
            "amount=3000&code=00&counterAccountName=&description=VQRIO123&orderCode=123"
        );
    }

    #[test]
    fn test_paid_webhook_normalizes() {
        let payos = provider("http://unused");
        let body = signed_envelope(
            "checksum-secret",
            json!({
                "orderCode": 1760745600000123i64,
                "amount": 50000,
                "code": "00",
                "desc": "success",
                "transactionDateTime": "2026-10-18 09:30:00",
                "reference": "FT123"
            }),
        );

        let event = payos.parse_webhook(&body, &HeaderMap::new()).unwrap();
        assert_eq!(event.provider_order_code, "1760745600000123");
        assert_eq!(event.amount, 50000);
        assert_eq!(event.outcome, PaymentOutcome::Paid);
        assert_eq!(event.raw_provider_fields["reference"], "FT123");
        assert_eq!(event.occurred_at.to_rfc3339(), "2026-10-18T02:30:00+00:00");
    }

    #[test]
    fn test_non_paid_code_is_failed_outcome() {
        let payos = provider("http://unused");
        let body = signed_envelope(
            "checksum-secret",
            json!({ "orderCode": 42, "amount": 2000, "code": "01" }),
        );
        let event = payos.parse_webhook(&body, &HeaderMap::new()).unwrap();
        assert_eq!(event.outcome, PaymentOutcome::Failed);
    }

    #[test]
    fn test_tampered_amount_fails_signature() {
        let payos = provider("http://unused");
        let body = signed_envelope(
            "checksum-secret",
            json!({ "orderCode": 42, "amount": 2000, "code": "00" }),
        );
        let tampered = String::from_utf8(body)
            .unwrap()
            .replace("\"amount\":2000", "\"amount\":2000000");
        let err = payos.verify(tampered.as_bytes(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err, VerificationError::SignatureMismatch);
    }

    #[test]
    fn test_envelope_without_object_data_is_malformed() {
        let payos = provider("http://unused");
        let body = json!({ "code": "00", "data": "x", "signature": "ab" }).to_string();
        assert!(matches!(
            payos.verify(body.as_bytes(), &HeaderMap::new()),
            Err(VerificationError::Malformed(_))
        ));
    }

    #[test]
    fn test_order_code_is_positive_integer() {
        let code: i64 = provider("http://unused").next_order_code().parse().unwrap();
        assert!(code > 0);
    }

    #[test]
    fn test_description_truncated() {
        assert_eq!(
            truncate_description("Donation for the flood relief campaign").chars().count(),
            DESCRIPTION_LIMIT
        );
    }

    #[tokio::test]
    async fn test_create_order_posts_signed_request() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/payment-requests")
            .match_header("x-client-id", "client")
            .match_header("x-api-key", "api")
            .match_body(mockito::Matcher::PartialJson(json!({ "orderCode": 777, "amount": 5000 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"00","desc":"success","data":{"checkoutUrl":"https://pay.example/777","qrCode":"000201"}}"#)
            .create_async()
            .await;

        let payos = provider(&server.url());
        let payload = payos
            .create_order(&OrderDraft {
                order_code: "777".to_string(),
                amount: 5000,
                donor_name: "Anonymous donor".to_string(),
                donor_id: None,
                campaign_id: None,
                description: "Donation".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(payload.redirect_url.as_deref(), Some("https://pay.example/777"));
        assert_eq!(payload.qr_code.as_deref(), Some("000201"));
    }
}
