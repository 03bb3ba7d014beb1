//! Outbound marketing hook and the content generator feeding it.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{format_vnd, SideEffectError};
use crate::domain::CampaignAggregate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookPayload {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub link: String,
}

#[async_trait]
pub trait AutomationHook: Send + Sync {
    async fn fire(&self, payload: &HookPayload) -> Result<(), SideEffectError>;
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, campaign: &CampaignAggregate) -> Result<String, SideEffectError>;
}

/// Copy used when no generator is configured or the generator fails.
pub fn template_copy(campaign: &CampaignAggregate) -> String {
    format!(
        "\"{}\" is halfway there! {} of {} raised so far. Every gift brings us closer, share the campaign and help us reach the goal.",
        campaign.title,
        format_vnd(campaign.current_amount),
        format_vnd(campaign.goal_amount)
    )
}

pub fn prompt_for(campaign: &CampaignAggregate) -> String {
    format!(
        "Write a short, warm social media post encouraging people to donate to the charity campaign \"{}\". It has just passed 50% of its goal: {} raised of {}. Keep it under 80 words.",
        campaign.title,
        format_vnd(campaign.current_amount),
        format_vnd(campaign.goal_amount)
    )
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

fn breaker(failure_threshold: u32, reset_timeout: Duration) -> Breaker {
    let backoff = backoff::equal_jittered(reset_timeout, reset_timeout * 2);
    let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
    Config::new().failure_policy(policy).build()
}

#[derive(Clone)]
pub struct HttpAutomationHook {
    client: Client,
    url: String,
    circuit_breaker: Breaker,
}

impl HttpAutomationHook {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(url, timeout, 3, Duration::from_secs(60))
    }

    pub fn with_circuit_breaker(
        url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            url,
            circuit_breaker: breaker(failure_threshold, reset_timeout),
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[async_trait]
impl AutomationHook for HttpAutomationHook {
    async fn fire(&self, payload: &HookPayload) -> Result<(), SideEffectError> {
        let client = self.client.clone();
        let url = self.url.clone();
        let body = payload.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;
                if !response.status().is_success() {
                    return Err(SideEffectError::Status(response.status().as_u16()));
                }
                Ok(())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(FailsafeError::Rejected) => Err(SideEffectError::CircuitOpen(
                "automation hook circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    text: String,
}

#[derive(Clone)]
pub struct HttpContentGenerator {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpContentGenerator {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, campaign: &CampaignAggregate) -> Result<String, SideEffectError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "prompt": prompt_for(campaign) }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SideEffectError::Status(response.status().as_u16()));
        }

        let generated: GeneratedText = response.json().await?;
        let text = generated.text.trim();
        if text.is_empty() {
            return Err(SideEffectError::InvalidResponse("empty text".to_string()));
        }
        Ok(text.to_string())
    }
}
