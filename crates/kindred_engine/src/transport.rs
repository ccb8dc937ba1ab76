//! Outbound SMS transport seam.
//!
//! The pipeline owns the outbound leg, so the trait lives here; the HTTP
//! carrier implementation lives in the gateway crate next to the inbound
//! edge.

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of one send. `remaining_quota` is passed through for metering
/// when the carrier reports it; the engine never acts on it.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub success: bool,
    pub remaining_quota: Option<i64>,
}

impl DeliveryResult {
    pub fn delivered() -> Self {
        Self {
            success: true,
            remaining_quota: None,
        }
    }
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, to: &str, from: &str, text: &str) -> Result<DeliveryResult>;
}
