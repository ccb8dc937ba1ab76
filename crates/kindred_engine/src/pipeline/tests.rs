//! End-to-end pipeline scenarios over mock collaborators.

use super::*;
use crate::cache::TtlCache;
use crate::detectors::NoSignalClassifier;
use crate::ratelimit::{SlidingWindowLimiter, UnlimitedLimiter};
use crate::transport::DeliveryResult;
use anyhow::Result;
use async_trait::async_trait;
use kindred_core::{BreakupReason, PersonalityKind, Role};
use kindred_memory::MemoryUserStore;
use std::sync::atomic::{AtomicUsize, Ordering};

/// LLM stub: counts chat calls, answers the summarizer prompt with valid
/// JSON so compaction can apply.
struct ScriptedLlm {
    chat_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
    summarizer_json: bool,
}

impl ScriptedLlm {
    fn new() -> Self {
        Self {
            chat_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            summarizer_json: true,
        }
    }

    fn with_broken_summarizer() -> Self {
        Self {
            summarizer_json: false,
            ..Self::new()
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        system: &str,
        _messages: &[ChatMessage],
    ) -> Result<crate::llm::Completion> {
        if system == kindred_memory::SUMMARIZER_SYSTEM_PROMPT {
            self.summarize_calls.fetch_add(1, Ordering::SeqCst);
            let content = if self.summarizer_json {
                "{\"summary\": \"they text a lot\", \"profile\": {\"chatty\": true}}".to_string()
            } else {
                "I would rather not".to_string()
            };
            return Ok(crate::llm::Completion {
                content,
                tokens_used: 5,
            });
        }
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        Ok(crate::llm::Completion {
            content: "Sounds good! Tell me more.".to_string(),
            tokens_used: 7,
        })
    }
}

struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    succeed: bool,
}

impl RecordingTransport {
    fn new(succeed: bool) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed,
        }
    }
}

#[async_trait]
impl SmsTransport for RecordingTransport {
    async fn send(&self, to: &str, _from: &str, text: &str) -> Result<DeliveryResult> {
        self.sent.lock().await.push((to.to_string(), text.to_string()));
        Ok(DeliveryResult {
            success: self.succeed,
            remaining_quota: None,
        })
    }
}

struct Harness {
    engine: MessageEngine,
    store: Arc<MemoryUserStore>,
    llm: Arc<ScriptedLlm>,
    transport: Arc<RecordingTransport>,
}

fn harness_with(llm: ScriptedLlm, limiter: Arc<dyn RateLimiter>) -> Harness {
    let store = Arc::new(MemoryUserStore::new());
    let llm = Arc::new(llm);
    let transport = Arc::new(RecordingTransport::new(true));
    let mut config = KindredConfig::default();
    config.sms.from_number = "12025550000".to_string();
    let engine = MessageEngine::new(
        store.clone(),
        Arc::new(TtlCache::new(Duration::from_secs(300), 100)),
        limiter,
        llm.clone(),
        Arc::new(NoSignalClassifier),
        transport.clone(),
        config,
    );
    Harness {
        engine,
        store,
        llm,
        transport,
    }
}

fn harness() -> Harness {
    harness_with(ScriptedLlm::new(), Arc::new(UnlimitedLimiter))
}

async fn seed(store: &MemoryUserStore, record: &UserRecord) {
    store.seed_under_key(&record.identity, record).await;
}

fn girlfriend() -> UserRecord {
    UserRecord::new(
        "12012675068",
        RelationshipKind::Girlfriend,
        PersonalityKind::Sunny,
    )
}

#[tokio::test]
async fn normal_chat_turn_appends_persists_and_sends() {
    let h = harness();
    seed(&h.store, &girlfriend()).await;

    let outcome = h
        .engine
        .handle_inbound("(201) 267-5068", "good morning!", ReplyChannel::Sms)
        .await
        .unwrap();

    assert_eq!(outcome.kind, TurnKind::Chat);
    assert!(outcome.delivered);
    assert_eq!(outcome.reply, "Sounds good! Tell me more.");

    let record = h.store.get("12012675068").await.unwrap().unwrap();
    assert_eq!(record.history.len(), 2);
    assert_eq!(record.history[0].role, Role::User);
    assert_eq!(record.history[1].role, Role::Assistant);
    assert_eq!(record.tokens_used, 7);

    let sent = h.transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "12012675068");
}

#[tokio::test]
async fn web_channel_skips_the_carrier() {
    let h = harness();
    seed(&h.store, &girlfriend()).await;
    let outcome = h
        .engine
        .handle_inbound("2012675068", "hello", ReplyChannel::Web)
        .await
        .unwrap();
    assert!(outcome.delivered);
    assert!(h.transport.sent.lock().await.is_empty());
}

#[tokio::test]
async fn unknown_and_invalid_senders_short_circuit() {
    let h = harness();
    assert!(matches!(
        h.engine
            .handle_inbound("2012675068", "hi", ReplyChannel::Sms)
            .await,
        Err(EngineError::UserNotFound(_))
    ));
    assert!(matches!(
        h.engine.handle_inbound("12345", "hi", ReplyChannel::Sms).await,
        Err(EngineError::InvalidIdentity(_))
    ));
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 0);
    assert!(h.transport.sent.lock().await.is_empty());
}

#[tokio::test]
async fn rate_limited_turn_consumes_no_model_call() {
    let h = harness_with(
        ScriptedLlm::new(),
        Arc::new(SlidingWindowLimiter::new(Duration::from_secs(60), 1)),
    );
    seed(&h.store, &girlfriend()).await;

    h.engine
        .handle_inbound("2012675068", "one", ReplyChannel::Sms)
        .await
        .unwrap();
    let err = h
        .engine
        .handle_inbound("2012675068", "two", ReplyChannel::Sms)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RateLimited(_)));
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn neglect_breakup_scenario() {
    let h = harness();
    let mut record = girlfriend();
    record.relationship = RelationshipKind::Boyfriend;
    record.last_message_time = Utc::now() - ChronoDuration::hours(25);
    record.history.push(ChatMessage::user("old"));
    record.history.push(ChatMessage::assistant("old reply"));
    record.history.push(ChatMessage::user("older"));
    seed(&h.store, &record).await;

    // Turn 1: the neglect trigger fires; no chat completion happens.
    let outcome = h
        .engine
        .handle_inbound("2012675068", "hey, you there?", ReplyChannel::Sms)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::BreakupDelivered);
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 0);

    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    let breakup = stored.last_breakup.as_ref().unwrap();
    assert_eq!(breakup.reason, BreakupReason::Neglect);
    assert_eq!(breakup.previous, RelationshipKind::Boyfriend);
    assert!(!stored.ex_mode);
    assert!(stored.history.is_empty());

    // Turn 2: the stored breakup is surfaced exactly once; ex_mode flips on
    // at the same instant last_breakup clears.
    let outcome = h
        .engine
        .handle_inbound("2012675068", "what do you mean", ReplyChannel::Sms)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::BreakupSurfaced);
    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    assert!(stored.ex_mode);
    assert!(stored.last_breakup.is_none());

    // Turn 3: replaying the same inbound does not re-acknowledge.
    let outcome = h
        .engine
        .handle_inbound("2012675068", "what do you mean", ReplyChannel::Sms)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::FriendsOnlyClarified);
    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    assert!(stored.ex_mode);
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn friend_reagreement_scenario() {
    let h = harness();
    let mut record = girlfriend();
    record.ex_mode = true;
    seed(&h.store, &record).await;

    let outcome = h
        .engine
        .handle_inbound("2012675068", "yes let's be friends", ReplyChannel::Sms)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::FriendshipAccepted);
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 0);

    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    assert!(!stored.ex_mode);
    assert_eq!(stored.relationship, RelationshipKind::Friend);

    // Conversation resumes normally afterwards.
    let outcome = h
        .engine
        .handle_inbound("2012675068", "ok! how was your day", ReplyChannel::Sms)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::Chat);
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rekindling_is_refused_without_model_calls() {
    let h = harness();
    let mut record = girlfriend();
    record.ex_mode = true;
    seed(&h.store, &record).await;

    let outcome = h
        .engine
        .handle_inbound("2012675068", "I still love you", ReplyChannel::Sms)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::RomanceRefused);
    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    assert!(stored.ex_mode);
    assert_eq!(h.llm.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn history_stays_bounded_over_many_turns() {
    let h = harness();
    let mut record = girlfriend();
    record.relationship = RelationshipKind::Friend;
    seed(&h.store, &record).await;

    for i in 0..30 {
        h.engine
            .handle_inbound("2012675068", &format!("message {}", i), ReplyChannel::Web)
            .await
            .unwrap();
        let stored = h.store.get("12012675068").await.unwrap().unwrap();
        assert!(
            stored.history.len() <= MAX_HISTORY,
            "history grew to {} on turn {}",
            stored.history.len(),
            i
        );
    }
    assert!(h.llm.summarize_calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn history_stays_bounded_even_when_compaction_keeps_failing() {
    let h = harness_with(
        ScriptedLlm::with_broken_summarizer(),
        Arc::new(UnlimitedLimiter),
    );
    let mut record = girlfriend();
    record.relationship = RelationshipKind::Friend;
    seed(&h.store, &record).await;

    for i in 0..30 {
        h.engine
            .handle_inbound("2012675068", &format!("message {}", i), ReplyChannel::Web)
            .await
            .unwrap();
        let stored = h.store.get("12012675068").await.unwrap().unwrap();
        assert!(stored.history.len() <= MAX_HISTORY);
    }
}

#[tokio::test]
async fn hard_cap_compaction_folds_and_restarts_history() {
    let h = harness();
    let mut record = girlfriend();
    record.relationship = RelationshipKind::Friend;
    for i in 0..19 {
        record.history.push(ChatMessage::user(format!("old {}", i)));
    }
    seed(&h.store, &record).await;

    let outcome = h
        .engine
        .handle_inbound("2012675068", "the twentieth", ReplyChannel::Web)
        .await
        .unwrap();
    assert_eq!(outcome.kind, TurnKind::Chat);

    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    // Cleared at the cap, then this turn's exchange re-seeded the buffer.
    assert_eq!(stored.history.len(), 2);
    assert_eq!(stored.summary, "they text a lot");
    assert_eq!(stored.profile["chatty"], true);
}

#[tokio::test]
async fn periodic_compaction_keeps_history_and_refreshes_memory() {
    let h = harness();
    let mut record = girlfriend();
    record.relationship = RelationshipKind::Friend;
    for i in 0..4 {
        record.history.push(ChatMessage::user(format!("old {}", i)));
    }
    seed(&h.store, &record).await;

    h.engine
        .handle_inbound("2012675068", "the fifth", ReplyChannel::Web)
        .await
        .unwrap();

    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    assert_eq!(stored.history.len(), 6); // 4 old + user + assistant
    assert_eq!(stored.summary, "they text a lot");
    assert_eq!(h.llm.summarize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failure_is_soft_and_state_still_persists() {
    let store = Arc::new(MemoryUserStore::new());
    let llm = Arc::new(ScriptedLlm::new());
    let transport = Arc::new(RecordingTransport::new(false));
    let mut config = KindredConfig::default();
    config.sms.from_number = "12025550000".to_string();
    let engine = MessageEngine::new(
        store.clone(),
        Arc::new(TtlCache::new(Duration::from_secs(300), 100)),
        Arc::new(UnlimitedLimiter),
        llm,
        Arc::new(NoSignalClassifier),
        transport,
        config,
    );
    seed(&store, &girlfriend()).await;

    let outcome = engine
        .handle_inbound("2012675068", "hi", ReplyChannel::Sms)
        .await
        .unwrap();
    assert!(!outcome.delivered);
    let stored = store.get("12012675068").await.unwrap().unwrap();
    assert_eq!(stored.history.len(), 2);
}

#[tokio::test]
async fn relationship_change_resets_summary_and_history_keeps_profile() {
    let h = harness();
    let mut record = girlfriend();
    record.summary = "long shared history".to_string();
    record.profile = serde_json::json!({"personal_info": {"name": "Sam"}});
    record.history.push(ChatMessage::user("hey"));
    seed(&h.store, &record).await;

    h.engine
        .change_relationship("2012675068", RelationshipKind::Coach)
        .await
        .unwrap();

    let stored = h.store.get("12012675068").await.unwrap().unwrap();
    assert_eq!(stored.relationship, RelationshipKind::Coach);
    assert!(stored.summary.is_empty());
    assert!(stored.history.is_empty());
    assert_eq!(stored.profile["personal_info"]["name"], "Sam");
}

#[tokio::test]
async fn replies_are_truncated_to_the_channel_limit() {
    let store = Arc::new(MemoryUserStore::new());
    let llm = Arc::new(LongWindedLlm);
    let transport = Arc::new(RecordingTransport::new(true));
    let mut config = KindredConfig::default();
    config.sms.max_reply_len = 40;
    config.sms.from_number = "12025550000".to_string();
    let engine = MessageEngine::new(
        store.clone(),
        Arc::new(TtlCache::new(Duration::from_secs(300), 100)),
        Arc::new(UnlimitedLimiter),
        llm,
        Arc::new(NoSignalClassifier),
        transport,
        config,
    );
    seed(&store, &girlfriend()).await;

    let outcome = engine
        .handle_inbound("2012675068", "tell me everything", ReplyChannel::Sms)
        .await
        .unwrap();
    assert!(outcome.reply.chars().count() <= 40);
    assert!(outcome.reply.ends_with("..."));
}

struct LongWindedLlm;

#[async_trait]
impl LlmClient for LongWindedLlm {
    async fn complete(&self, _: &str, _: &[ChatMessage]) -> Result<crate::llm::Completion> {
        Ok(crate::llm::Completion {
            content: "First thing. Second thing happened too. Third thing is a whole story."
                .to_string(),
            tokens_used: 1,
        })
    }
}
