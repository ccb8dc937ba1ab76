//! Outbound SMS transport implementations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kindred_core::config::SmsConfig;
use kindred_engine::{DeliveryResult, SmsTransport};
use reqwest::Client;

/// Carrier REST transport: posts `To`/`From`/`Body` form data with basic
/// auth, the shape most SMS carriers accept.
pub struct HttpSmsTransport {
    client: Client,
    config: SmsConfig,
}

impl HttpSmsTransport {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsTransport {
    async fn send(&self, to: &str, from: &str, text: &str) -> Result<DeliveryResult> {
        let sid = self
            .config
            .account_sid
            .as_deref()
            .context("No SMS account sid configured")?;
        let token = self
            .config
            .auth_token
            .as_deref()
            .context("No SMS auth token configured")?;

        let response = self
            .client
            .post(&self.config.carrier_url)
            .basic_auth(sid, Some(token))
            .form(&[("To", to), ("From", from), ("Body", text)])
            .send()
            .await
            .context("Failed to reach SMS carrier")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Carrier rejected send ({}): {}", status, body);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .unwrap_or(serde_json::Value::Null);
        let remaining_quota = payload["remaining_quota"].as_i64();

        Ok(DeliveryResult {
            success: true,
            remaining_quota,
        })
    }
}

/// Transport that only logs. Used in local development when no carrier is
/// configured.
pub struct LoggingTransport;

#[async_trait]
impl SmsTransport for LoggingTransport {
    async fn send(&self, to: &str, from: &str, text: &str) -> Result<DeliveryResult> {
        tracing::info!(to, from, "SMS (not sent, no carrier configured): {}", text);
        Ok(DeliveryResult::delivered())
    }
}
