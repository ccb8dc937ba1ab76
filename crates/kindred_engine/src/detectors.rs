//! Breakup triggers for romantic relationship kinds.
//!
//! Neglect is a local elapsed-time check. Lying and unacceptable-content
//! detection are external classifier calls; a classifier error or timeout
//! is "no signal" — it never triggers a breakup and is never retried within
//! the turn.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use kindred_core::{BreakupReason, ChatMessage, UserRecord};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::LlmClient;

#[async_trait]
pub trait BehaviorClassifier: Send + Sync {
    /// Does this message contradict what the profile says about the user?
    async fn detect_lying(&self, message: &str, profile: &Value) -> Result<bool>;
    /// Is this message abusive or otherwise unacceptable toward a partner?
    async fn detect_unacceptable(&self, message: &str) -> Result<bool>;
}

/// Ordered trigger evaluation, first match wins. Returns `None` when no
/// trigger fires or when the only signals came from failing classifiers.
pub async fn breakup_signal(
    record: &UserRecord,
    message: &str,
    classifier: &dyn BehaviorClassifier,
    neglect_after: ChronoDuration,
    classifier_timeout: Duration,
    now: DateTime<Utc>,
) -> Option<BreakupReason> {
    if !record.relationship.is_romantic() {
        return None;
    }

    if now - record.last_message_time > neglect_after {
        return Some(BreakupReason::Neglect);
    }

    match tokio::time::timeout(
        classifier_timeout,
        classifier.detect_lying(message, &record.profile),
    )
    .await
    {
        Ok(Ok(true)) => return Some(BreakupReason::Lying),
        Ok(Ok(false)) => {}
        Ok(Err(e)) => tracing::warn!("Lying classifier failed, treating as no signal: {:#}", e),
        Err(_) => tracing::warn!("Lying classifier timed out, treating as no signal"),
    }

    match tokio::time::timeout(classifier_timeout, classifier.detect_unacceptable(message)).await {
        Ok(Ok(true)) => Some(BreakupReason::Unacceptable),
        Ok(Ok(false)) => None,
        Ok(Err(e)) => {
            tracing::warn!("Unacceptable classifier failed, treating as no signal: {:#}", e);
            None
        }
        Err(_) => {
            tracing::warn!("Unacceptable classifier timed out, treating as no signal");
            None
        }
    }
}

// ============================================================================
// LLM-backed classifier
// ============================================================================

const LYING_PROMPT: &str = "You check one text message against a JSON profile of known facts \
about its sender. Answer with the single word YES if the message clearly contradicts the \
profile, otherwise NO. When in doubt, answer NO.";

const UNACCEPTABLE_PROMPT: &str = "You screen one text message sent to a romantic partner. \
Answer with the single word YES if it is abusive, threatening, or degrading, otherwise NO. \
Rudeness alone is NO.";

/// Yes/no oracle built on the chat-completion collaborator.
pub struct LlmClassifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    async fn ask(&self, system: &str, content: String) -> Result<bool> {
        let completion = self
            .llm
            .complete(system, &[ChatMessage::user(content)])
            .await
            .context("Classifier call failed")?;
        let answer = completion.content.trim().to_ascii_uppercase();
        Ok(answer.starts_with("YES"))
    }
}

#[async_trait]
impl BehaviorClassifier for LlmClassifier {
    async fn detect_lying(&self, message: &str, profile: &Value) -> Result<bool> {
        self.ask(
            LYING_PROMPT,
            format!("Profile: {}\n\nMessage: {}", profile, message),
        )
        .await
    }

    async fn detect_unacceptable(&self, message: &str) -> Result<bool> {
        self.ask(UNACCEPTABLE_PROMPT, format!("Message: {}", message))
            .await
    }
}

/// Classifier that never signals. Used when classifiers are disabled.
pub struct NoSignalClassifier;

#[async_trait]
impl BehaviorClassifier for NoSignalClassifier {
    async fn detect_lying(&self, _message: &str, _profile: &Value) -> Result<bool> {
        Ok(false)
    }
    async fn detect_unacceptable(&self, _message: &str) -> Result<bool> {
        Ok(false)
    }
}
