//! The per-message pipeline.
//!
//! Order of work for one inbound message: normalize → rate limit →
//! per-identity lock → resolve freshest record → detector signal →
//! lifecycle plan → effects → persist → compose → send. Identity and
//! rate-limit rejections short-circuit before any state mutation or model
//! call. Nothing is persisted for a turn that fails mid-flight, so a
//! redelivery starts from the last durable state.

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use kindred_core::persona;
use kindred_core::{
    BreakupRecord, ChatMessage, EngineError, KindredConfig, LifecycleState, RelationshipKind,
    UserRecord, MAX_HISTORY,
};
use kindred_memory::{buffer, Compactor, Summarizer, UserStore, SUMMARIZER_SYSTEM_PROMPT};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::cache::SessionCache;
use crate::detectors::{breakup_signal, BehaviorClassifier};
use crate::compose::truncate_for_channel;
use crate::identity::IdentityResolver;
use crate::lifecycle::{plan_turn, TurnPlan};
use crate::llm::LlmClient;
use crate::ratelimit::RateLimiter;
use crate::transport::SmsTransport;

/// Which edge the reply leaves through. The SMS path sends via the carrier
/// and treats transport failure as soft; the web path returns the reply to
/// the HTTP caller directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyChannel {
    Sms,
    Web,
}

/// How the turn was handled. Everything except `Chat` bypassed the
/// chat-completion collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Chat,
    BreakupDelivered,
    BreakupSurfaced,
    FriendshipAccepted,
    RomanceRefused,
    FriendsOnlyClarified,
}

#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub reply: String,
    pub kind: TurnKind,
    /// False when the outbound SMS send failed or timed out (soft failure).
    pub delivered: bool,
}

/// Summarizer implementation over the chat-completion collaborator.
struct LlmSummarizer {
    llm: Arc<dyn LlmClient>,
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        summary: &str,
        profile: &Value,
        history: &[ChatMessage],
    ) -> anyhow::Result<String> {
        let mut transcript = String::new();
        for msg in history {
            let who = match msg.role {
                kindred_core::Role::User => "user",
                kindred_core::Role::Assistant => "assistant",
            };
            transcript.push_str(who);
            transcript.push_str(": ");
            transcript.push_str(&msg.content);
            transcript.push('\n');
        }
        let content = format!(
            "Current summary:\n{}\n\nCurrent profile JSON:\n{}\n\nConversation:\n{}",
            if summary.is_empty() { "(none)" } else { summary },
            profile,
            transcript
        );
        let completion = self
            .llm
            .complete(SUMMARIZER_SYSTEM_PROMPT, &[ChatMessage::user(content)])
            .await
            .context("Summarization call failed")?;
        Ok(completion.content)
    }
}

pub struct MessageEngine {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn SessionCache>,
    limiter: Arc<dyn RateLimiter>,
    llm: Arc<dyn LlmClient>,
    classifier: Arc<dyn BehaviorClassifier>,
    transport: Arc<dyn SmsTransport>,
    resolver: IdentityResolver,
    compactor: Compactor,
    config: KindredConfig,
    /// Per-identity critical sections. An entry is created on first contact
    /// and kept for the process lifetime; the map itself is advisory state.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MessageEngine {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache: Arc<dyn SessionCache>,
        limiter: Arc<dyn RateLimiter>,
        llm: Arc<dyn LlmClient>,
        classifier: Arc<dyn BehaviorClassifier>,
        transport: Arc<dyn SmsTransport>,
        config: KindredConfig,
    ) -> Self {
        let resolver = IdentityResolver::new(store.clone(), cache.clone());
        let compactor = Compactor::new(
            Arc::new(LlmSummarizer { llm: llm.clone() }),
            Duration::from_secs(config.memory.compact_timeout_secs),
        );
        Self {
            store,
            cache,
            limiter,
            llm,
            classifier,
            transport,
            resolver,
            compactor,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, identity: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Handle one inbound message end to end.
    pub async fn handle_inbound(
        &self,
        from: &str,
        text: &str,
        channel: ReplyChannel,
    ) -> Result<InboundOutcome, EngineError> {
        let canonical = crate::identity::normalize(from)?;

        if !self.limiter.allow(&canonical).await {
            return Err(EngineError::RateLimited(canonical));
        }

        // Everything from the record read to the persist runs inside this
        // identity's critical section; message N is durable before N+1 for
        // the same sender starts mutating.
        let lock = self.lock_for(&canonical).await;
        let _guard = lock.lock().await;

        let (canonical, mut record) = self.resolver.resolve(from).await?;
        let now = Utc::now();

        let signal = if record.lifecycle() == LifecycleState::Active
            && record.last_breakup.is_none()
        {
            breakup_signal(
                &record,
                text,
                self.classifier.as_ref(),
                ChronoDuration::hours(self.config.lifecycle.neglect_hours),
                Duration::from_secs(self.config.lifecycle.classifier_timeout_secs),
                now,
            )
            .await
        } else {
            None
        };

        let plan = plan_turn(&record, text, signal);
        tracing::info!(identity = %canonical, ?plan, "Planned turn");

        let (reply, kind) = match plan {
            TurnPlan::SurfaceBreakup { previous } => {
                record.last_breakup = None;
                record.ex_mode = true;
                record.last_message_time = now;
                self.store
                    .upsert(
                        &canonical,
                        json!({
                            "ex_mode": true,
                            "last_breakup": null,
                            "last_message_time": now,
                        }),
                    )
                    .await?;
                (persona::breakup_acknowledgment(previous), TurnKind::BreakupSurfaced)
            }
            TurnPlan::AcceptFriendship => {
                record.ex_mode = false;
                record.relationship = RelationshipKind::Friend;
                record.last_message_time = now;
                self.store
                    .upsert(
                        &canonical,
                        json!({
                            "ex_mode": false,
                            "relationship": RelationshipKind::Friend,
                            "last_message_time": now,
                        }),
                    )
                    .await?;
                (
                    persona::friendship_confirmation().to_string(),
                    TurnKind::FriendshipAccepted,
                )
            }
            TurnPlan::RefuseRomance => {
                record.last_message_time = now;
                self.store
                    .upsert(&canonical, json!({ "last_message_time": now }))
                    .await?;
                (persona::romance_refusal().to_string(), TurnKind::RomanceRefused)
            }
            TurnPlan::ClarifyFriendsOnly => {
                record.last_message_time = now;
                self.store
                    .upsert(&canonical, json!({ "last_message_time": now }))
                    .await?;
                (
                    persona::friendship_clarification().to_string(),
                    TurnKind::FriendsOnlyClarified,
                )
            }
            TurnPlan::Breakup { reason } => {
                let previous = record.relationship;
                record.last_breakup = Some(BreakupRecord {
                    date: now,
                    previous,
                    reason,
                });
                // Scripted exchanges carry no memory value; an empty buffer
                // also makes the next turn satisfy the surfacing gate.
                record.history.clear();
                record.last_message_time = now;
                self.store
                    .upsert(
                        &canonical,
                        json!({
                            "last_breakup": record.last_breakup,
                            "history": [],
                            "last_message_time": now,
                        }),
                    )
                    .await?;
                tracing::info!(identity = %canonical, ?reason, "Breakup recorded");
                (persona::breakup_message(reason, previous), TurnKind::BreakupDelivered)
            }
            TurnPlan::Chat => {
                let reply = self.chat_turn(&canonical, &mut record, text, now).await?;
                (reply, TurnKind::Chat)
            }
        };

        self.cache.put(&canonical, record).await;

        let wire_reply = truncate_for_channel(&reply, self.config.sms.max_reply_len);
        let delivered = match channel {
            ReplyChannel::Web => true,
            ReplyChannel::Sms => self.send_sms(&canonical, &wire_reply).await,
        };

        Ok(InboundOutcome {
            reply: wire_reply,
            kind,
            delivered,
        })
    }

    /// The normal conversation path: buffer append, conditional compaction,
    /// chat completion, persist.
    async fn chat_turn(
        &self,
        canonical: &str,
        record: &mut UserRecord,
        text: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<String, EngineError> {
        buffer::push(record, ChatMessage::user(text));

        if let Some(trigger) =
            buffer::compaction_due(record.history.len(), self.config.memory.refresh_every)
        {
            let outcome = self.compactor.compact(record, trigger).await;
            if record.history.is_empty() {
                // Hard cap folded the whole buffer, current message included;
                // replay it so the model still sees this turn.
                buffer::push(record, ChatMessage::user(text));
            }
            tracing::debug!(identity = %canonical, ?trigger, ?outcome, "Compaction considered");
        }

        let system = persona::build_system_prompt(record);
        let completion = tokio::time::timeout(
            Duration::from_secs(self.config.llm.timeout_secs),
            self.llm.complete(&system, &record.history),
        )
        .await
        .map_err(|_| EngineError::Llm("chat completion timed out".to_string()))?
        .map_err(|e| EngineError::Llm(format!("{:#}", e)))?;

        record.tokens_used += completion.tokens_used;
        buffer::push(record, ChatMessage::assistant(completion.content.clone()));

        // Lossy fallback only reachable when compaction kept being skipped:
        // the bound on stored history wins over keeping the oldest turns.
        if record.history.len() > MAX_HISTORY {
            let excess = record.history.len() - MAX_HISTORY;
            record.history.drain(..excess);
            tracing::warn!(identity = %canonical, excess, "History over cap after skipped compaction, trimmed oldest");
        }

        record.last_message_time = now;
        self.store
            .upsert(
                canonical,
                json!({
                    "summary": record.summary,
                    "profile": record.profile,
                    "history": record.history,
                    "last_message_time": now,
                    "tokens_used": record.tokens_used,
                }),
            )
            .await?;

        Ok(completion.content)
    }

    async fn send_sms(&self, to: &str, text: &str) -> bool {
        let send = self
            .transport
            .send(to, &self.config.sms.from_number, text);
        match tokio::time::timeout(
            Duration::from_secs(self.config.sms.send_timeout_secs),
            send,
        )
        .await
        {
            Ok(Ok(result)) => {
                if !result.success {
                    tracing::error!(to, "Carrier reported delivery failure");
                }
                result.success
            }
            Ok(Err(e)) => {
                tracing::error!(to, "Outbound send failed: {:#}", e);
                false
            }
            Err(_) => {
                tracing::error!(to, "Outbound send timed out");
                false
            }
        }
    }

    /// Settings-triggered relationship change: selective memory reset.
    /// Summary and history restart, the profile is retained, and any
    /// pending breakup state tied to the old framing is dropped.
    pub async fn change_relationship(
        &self,
        raw: &str,
        new_kind: RelationshipKind,
    ) -> Result<(), EngineError> {
        let canonical = crate::identity::normalize(raw)?;
        let lock = self.lock_for(&canonical).await;
        let _guard = lock.lock().await;

        let (canonical, mut record) = self.resolver.resolve(raw).await?;
        record.relationship = new_kind;
        record.summary = String::new();
        record.history.clear();
        record.ex_mode = false;
        record.last_breakup = None;
        self.store
            .upsert(
                &canonical,
                json!({
                    "relationship": new_kind,
                    "summary": "",
                    "history": [],
                    "ex_mode": false,
                    "last_breakup": null,
                }),
            )
            .await?;
        self.cache.put(&canonical, record).await;
        tracing::info!(identity = %canonical, ?new_kind, "Relationship changed, memory reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
