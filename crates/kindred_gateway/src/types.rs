//! Wire types for the gateway edges.

use kindred_core::RelationshipKind;
use serde::{Deserialize, Serialize};

/// Carrier webhook payload for an inbound SMS. Carriers post this as form
/// data; delivery-receipt callbacks reuse the same shape with a status
/// field set and no body.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsInbound {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    /// Set on delivery-receipt callbacks ("sent", "delivered", "failed").
    #[serde(rename = "SmsStatus", alias = "MessageStatus", default)]
    pub status: Option<String>,
}

impl SmsInbound {
    /// Delivery receipts must be ignored entirely: no state mutation, no
    /// reply. A payload is a receipt when it carries a status but no
    /// message text.
    pub fn is_delivery_receipt(&self) -> bool {
        self.status.is_some() && self.body.as_deref().map_or(true, |b| b.trim().is_empty())
    }
}

/// Body of the always-200 SMS webhook response. Failures on this path are
/// encoded here rather than in the status code so the carrier never
/// re-delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl SmsAck {
    pub fn silent() -> Self {
        Self {
            success: true,
            reply: None,
        }
    }
}

/// Web/dashboard message path. Unlike the carrier, this caller can retry,
/// so errors map to real status codes.
#[derive(Debug, Clone, Deserialize)]
pub struct WebMessage {
    pub identity: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebReply {
    pub reply: String,
}

/// Settings payload for the relationship-kind change.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipChange {
    pub identity: String,
    pub relationship: RelationshipKind,
}
