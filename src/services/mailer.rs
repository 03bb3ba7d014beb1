//! Donation receipts sent through an HTTP mail relay.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{format_vnd, SideEffectError};

#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub to: String,
    pub donor_name: String,
    pub order_code: String,
    pub amount: i64,
    pub campaign_title: Option<String>,
    pub paid_at: DateTime<Utc>,
}

impl Receipt {
    pub fn subject(&self) -> String {
        format!("Thank you for your donation #{}", self.order_code)
    }

    /// Donor and campaign text is user supplied and escaped before rendering.
    pub fn html(&self) -> String {
        let target = self
            .campaign_title
            .as_deref()
            .map(ammonia::clean_text)
            .unwrap_or_else(|| "the general relief fund".to_string());
        format!(
            "<p>Dear {},</p>\
             <p>We have received your donation to <strong>{}</strong>.</p>\
             <ul>\
             <li>Transaction code: {}</li>\
             <li>Amount: {}</li>\
             <li>Time: {}</li>\
             </ul>\
             <p>Thank you for standing with the community.</p>",
            ammonia::clean_text(&self.donor_name),
            target,
            ammonia::clean_text(&self.order_code),
            format_vnd(self.amount),
            self.paid_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

#[async_trait]
pub trait ReceiptMailer: Send + Sync {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), SideEffectError>;
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    html: String,
}

#[derive(Clone)]
pub struct HttpMailRelay {
    client: Client,
    url: String,
    from: String,
}

impl HttpMailRelay {
    pub fn new(url: String, from: String, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client, url, from }
    }
}

#[async_trait]
impl ReceiptMailer for HttpMailRelay {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), SideEffectError> {
        let message = RelayMessage {
            from: &self.from,
            to: &receipt.to,
            subject: receipt.subject(),
            html: receipt.html(),
        };

        let response = self.client.post(&self.url).json(&message).send().await?;
        if !response.status().is_success() {
            return Err(SideEffectError::Status(response.status().as_u16()));
        }
        tracing::debug!(order_code = %receipt.order_code, "Receipt handed to mail relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn receipt() -> Receipt {
        Receipt {
            to: "lan@example.com".to_string(),
            donor_name: "Lan".to_string(),
            order_code: "261018_000042".to_string(),
            amount: 250_000,
            campaign_title: Some("Flood relief".to_string()),
            paid_at: Utc.with_ymd_and_hms(2026, 10, 18, 2, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_receipt_body_has_code_amount_title_and_time() {
        let html = receipt().html();
        assert!(html.contains("261018_000042"));
        assert!(html.contains("250.000 VND"));
        assert!(html.contains("Flood&#32;relief"));
        assert!(html.contains("2026-10-18 02:30:00 UTC"));
    }

    #[test]
    fn test_receipt_escapes_donor_supplied_text() {
        let mut receipt = receipt();
        receipt.donor_name = "<script>alert(1)</script>".to_string();
        receipt.campaign_title = Some("Tom & <b>Jerry</b>".to_string());

        let html = receipt.html();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp;"));
        assert!(html.contains("<strong>"));
    }

    #[tokio::test]
    async fn test_relay_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send")
            .with_status(500)
            .create_async()
            .await;

        let relay = HttpMailRelay::new(
            format!("{}/send", server.url()),
            "noreply@relief.example".to_string(),
            Duration::from_secs(2),
        );
        assert!(matches!(
            relay.send_receipt(&receipt()).await,
            Err(SideEffectError::Status(500))
        ));
    }
}
