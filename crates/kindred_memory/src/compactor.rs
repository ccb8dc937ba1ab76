//! Memory compaction: fold conversation history into the running summary
//! and structured profile via an external summarization call.
//!
//! Compaction failure is deliberately non-fatal. A malformed model response
//! or a timeout leaves summary, profile, and history all untouched and the
//! turn proceeds on the stale memory.

use anyhow::Result;
use async_trait::async_trait;
use kindred_core::{ChatMessage, UserRecord};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::buffer::CompactionTrigger;

/// System prompt for the summarization/profile-extraction call. The model
/// must answer with a single JSON object and nothing else.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = r#"You maintain long-term memory for a texting companion.
You receive the current summary, the current profile JSON, and the recent conversation.

Return ONLY a JSON object of this shape:
{"summary": "<updated free-text summary of everything known about the user>",
 "profile": {"preferences": {...}, "personal_info": {...}, "relationship_dynamics": {...}}}

Rules:
1. Carry forward everything still true from the old summary; fold in what the conversation adds.
2. The profile is cumulative — never drop previously known keys unless contradicted.
3. Be concrete. No commentary outside the JSON object."#;

/// The collaborator seam: given the pieces of a record, produce the raw
/// model text. The engine crate implements this on top of its LLM client.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        summary: &str,
        profile: &Value,
        history: &[ChatMessage],
    ) -> Result<String>;
}

/// Parsed summarizer output.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub summary: String,
    #[serde(default)]
    pub profile: Value,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in summarizer output")]
    NoJson,
    #[error("summarizer output is not the expected shape: {0}")]
    BadShape(#[from] serde_json::Error),
    #[error("summarizer returned an empty summary")]
    EmptySummary,
}

/// Extract the update from raw model text. Tolerates code fences and prose
/// around the object; everything from the first `{` to the last `}` must
/// parse as the expected shape.
pub fn parse_update(text: &str) -> Result<ProfileUpdate, ParseError> {
    let start = text.find('{').ok_or(ParseError::NoJson)?;
    let end = text.rfind('}').ok_or(ParseError::NoJson)?;
    if end < start {
        return Err(ParseError::NoJson);
    }
    let update: ProfileUpdate = serde_json::from_str(&text[start..=end])?;
    if update.summary.trim().is_empty() {
        return Err(ParseError::EmptySummary);
    }
    Ok(update)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Summary/profile replaced; `cleared` says whether the hard cap also
    /// emptied the history buffer.
    Applied { cleared: bool },
    /// Call failed, timed out, or didn't parse. Record unchanged.
    Skipped,
}

pub struct Compactor {
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
}

impl Compactor {
    pub fn new(summarizer: Arc<dyn Summarizer>, timeout: Duration) -> Self {
        Self {
            summarizer,
            timeout,
        }
    }

    /// Run one compaction invocation for this turn. History is cleared only
    /// on a hard-cap trigger, and only after a successful parse.
    pub async fn compact(
        &self,
        record: &mut UserRecord,
        trigger: CompactionTrigger,
    ) -> CompactionOutcome {
        let call = self
            .summarizer
            .summarize(&record.summary, &record.profile, &record.history);
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!("Compaction call failed (skipped this turn): {:#}", e);
                return CompactionOutcome::Skipped;
            }
            Err(_) => {
                tracing::warn!("Compaction call timed out (skipped this turn)");
                return CompactionOutcome::Skipped;
            }
        };

        match parse_update(&raw) {
            Ok(update) => {
                record.summary = update.summary;
                record.profile = update.profile;
                let cleared = trigger == CompactionTrigger::HardCap;
                if cleared {
                    record.history.clear();
                }
                tracing::debug!(
                    identity = %record.identity,
                    ?trigger,
                    cleared,
                    "Compaction applied"
                );
                CompactionOutcome::Applied { cleared }
            }
            Err(e) => {
                tracing::warn!("Compaction output unusable ({}), keeping prior memory", e);
                CompactionOutcome::Skipped
            }
        }
    }
}
