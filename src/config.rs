use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::providers::{PayOsConfig, ZaloPayConfig};

const DEFAULT_ZALOPAY_ENDPOINT: &str = "https://sb-openapi.zalopay.vn/v2/create";
const DEFAULT_PAYOS_ENDPOINT: &str = "https://api-merchant.payos.vn";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub min_donation_amount: i64,
    pub side_effect_timeout: Duration,
    pub frontend_url: String,
    pub public_base_url: String,
    pub admin_api_key: Option<String>,
    pub cors_allowed_origins: Option<String>,
    pub zalopay: Option<ZaloPayConfig>,
    pub payos: Option<PayOsConfig>,
    pub automation_hook_url: Option<String>,
    pub content_generator_url: Option<String>,
    pub content_generator_key: Option<String>,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let min_donation_amount: i64 = env::var("MIN_DONATION_AMOUNT")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()?;
        let side_effect_timeout = Duration::from_secs(
            env::var("SIDE_EFFECT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        );
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        url::Url::parse(&frontend_url)
            .map_err(|e| anyhow::anyhow!("FRONTEND_URL is not a valid URL: {}", e))?;
        url::Url::parse(&public_base_url)
            .map_err(|e| anyhow::anyhow!("PUBLIC_BASE_URL is not a valid URL: {}", e))?;

        let zalopay = zalopay_from_env(&frontend_url, &public_base_url, min_donation_amount, side_effect_timeout);
        let payos = payos_from_env(&frontend_url, min_donation_amount, side_effect_timeout);

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            min_donation_amount,
            side_effect_timeout,
            frontend_url,
            public_base_url,
            admin_api_key: optional("ADMIN_API_KEY"),
            cors_allowed_origins: optional("CORS_ALLOWED_ORIGINS"),
            zalopay,
            payos,
            automation_hook_url: optional("AUTOMATION_HOOK_URL"),
            content_generator_url: optional("CONTENT_GENERATOR_URL"),
            content_generator_key: optional("CONTENT_GENERATOR_KEY"),
            mail_relay_url: optional("MAIL_RELAY_URL"),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Enabled only when app id and both keys are present.
fn zalopay_from_env(
    frontend_url: &str,
    public_base_url: &str,
    minimum_amount: i64,
    timeout: Duration,
) -> Option<ZaloPayConfig> {
    Some(ZaloPayConfig {
        app_id: optional("ZALOPAY_APP_ID")?,
        key1: optional("ZALOPAY_KEY1")?,
        key2: optional("ZALOPAY_KEY2")?,
        endpoint: optional("ZALOPAY_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_ZALOPAY_ENDPOINT.to_string()),
        callback_url: format!("{}/webhooks/zalopay", public_base_url.trim_end_matches('/')),
        redirect_base_url: format!("{}/donate", frontend_url.trim_end_matches('/')),
        minimum_amount,
        timeout,
    })
}

fn payos_from_env(frontend_url: &str, minimum_amount: i64, timeout: Duration) -> Option<PayOsConfig> {
    let frontend = frontend_url.trim_end_matches('/');
    Some(PayOsConfig {
        client_id: optional("PAYOS_CLIENT_ID")?,
        api_key: optional("PAYOS_API_KEY")?,
        checksum_key: optional("PAYOS_CHECKSUM_KEY")?,
        endpoint: optional("PAYOS_ENDPOINT").unwrap_or_else(|| DEFAULT_PAYOS_ENDPOINT.to_string()),
        return_url: optional("PAYOS_RETURN_URL")
            .unwrap_or_else(|| format!("{}/donate/success", frontend)),
        cancel_url: optional("PAYOS_CANCEL_URL")
            .unwrap_or_else(|| format!("{}/donate/cancel", frontend)),
        minimum_amount,
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zalopay_requires_all_keys() {
        env::remove_var("ZALOPAY_APP_ID");
        env::set_var("ZALOPAY_KEY1", "k1");
        env::set_var("ZALOPAY_KEY2", "k2");
        assert!(zalopay_from_env("http://f", "http://p", 1000, Duration::from_secs(1)).is_none());

        env::set_var("ZALOPAY_APP_ID", "2553");
        let cfg = zalopay_from_env("http://f/", "http://p/", 1000, Duration::from_secs(1)).unwrap();
        assert_eq!(cfg.callback_url, "http://p/webhooks/zalopay");
        assert_eq!(cfg.redirect_base_url, "http://f/donate");

        env::remove_var("ZALOPAY_APP_ID");
        env::remove_var("ZALOPAY_KEY1");
        env::remove_var("ZALOPAY_KEY2");
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        env::set_var("CONFIG_TEST_BLANK", "   ");
        assert!(optional("CONFIG_TEST_BLANK").is_none());
        env::remove_var("CONFIG_TEST_BLANK");
    }
}
