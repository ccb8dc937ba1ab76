//! The durable per-user aggregate and the lifecycle state derived from it.
//!
//! A `UserRecord` is what the backing store holds for one sender: identity,
//! rolling conversation history, the compacted summary/profile memory, and
//! the relationship fields the lifecycle machine reads. The record is a
//! plain serde document so the store can merge partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on stored conversation history. Hitting it triggers a
/// compaction that folds history into the summary and clears the buffer.
pub const MAX_HISTORY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation as stored in `UserRecord::history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The social framing of the assistant toward this user. Only the romantic
/// kinds participate in the breakup lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Friend,
    Mom,
    Dad,
    Boyfriend,
    Girlfriend,
    Coach,
    Cousin,
    Therapist,
}

impl RelationshipKind {
    pub fn is_romantic(&self) -> bool {
        matches!(self, RelationshipKind::Boyfriend | RelationshipKind::Girlfriend)
    }

    /// All kinds, for settings validation and catalog tests.
    pub fn all() -> &'static [RelationshipKind] {
        &[
            RelationshipKind::Friend,
            RelationshipKind::Mom,
            RelationshipKind::Dad,
            RelationshipKind::Boyfriend,
            RelationshipKind::Girlfriend,
            RelationshipKind::Coach,
            RelationshipKind::Cousin,
            RelationshipKind::Therapist,
        ]
    }
}

/// Closed catalog of voice/personality presets. The engine only ever reads
/// the style shape behind these (see `persona`), never the prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalityKind {
    Sunny,
    Dry,
    Gentle,
    Bookish,
    Chaotic,
    Stoic,
}

impl PersonalityKind {
    pub fn all() -> &'static [PersonalityKind] {
        &[
            PersonalityKind::Sunny,
            PersonalityKind::Dry,
            PersonalityKind::Gentle,
            PersonalityKind::Bookish,
            PersonalityKind::Chaotic,
            PersonalityKind::Stoic,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakupReason {
    Neglect,
    Lying,
    Unacceptable,
}

/// Recorded when a breakup triggers; cleared exactly once when it is
/// surfaced to the user (at which instant `ex_mode` flips on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakupRecord {
    pub date: DateTime<Utc>,
    pub previous: RelationshipKind,
    pub reason: BreakupReason,
}

/// The durable aggregate per end user, stored as one JSON document keyed by
/// canonical identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Canonical E.164-like digit string, e.g. "12012675068".
    pub identity: String,
    /// Evolving free-text memory, rewritten by compaction.
    #[serde(default)]
    pub summary: String,
    /// Rolling conversation buffer, bounded by `MAX_HISTORY`.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// Semi-structured inferred attributes (preferences, personal info,
    /// relationship dynamics). Keys are not fixed.
    #[serde(default = "empty_object")]
    pub profile: serde_json::Value,
    pub relationship: RelationshipKind,
    pub personality: PersonalityKind,
    pub last_message_time: DateTime<Utc>,
    #[serde(default)]
    pub ex_mode: bool,
    #[serde(default)]
    pub last_breakup: Option<BreakupRecord>,
    /// Monotonic token meter across all model calls for this user.
    #[serde(default)]
    pub tokens_used: u64,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl UserRecord {
    pub fn new(
        identity: impl Into<String>,
        relationship: RelationshipKind,
        personality: PersonalityKind,
    ) -> Self {
        Self {
            identity: identity.into(),
            summary: String::new(),
            history: Vec::new(),
            profile: empty_object(),
            relationship,
            personality,
            last_message_time: Utc::now(),
            ex_mode: false,
            last_breakup: None,
            tokens_used: 0,
        }
    }

    /// Derive the lifecycle state from the stored fields. Computed at read
    /// time on every turn instead of being stored, so there is nothing to
    /// keep in sync.
    pub fn lifecycle(&self) -> LifecycleState {
        if self.ex_mode {
            return LifecycleState::AwaitingFriendAgreement;
        }
        if self.last_breakup.is_some() && self.history.len() <= 2 {
            return LifecycleState::BreakupJustOccurred;
        }
        if self.relationship == RelationshipKind::Friend && self.last_breakup.is_none() {
            // Indistinguishable from a plain friendship once ex_mode clears;
            // both get the same (unrestricted, non-romantic) handling.
            return LifecycleState::Friends;
        }
        LifecycleState::Active
    }
}

/// Lifecycle of the relationship, derived from
/// `(ex_mode, last_breakup, relationship, history.len())`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Normal conversation.
    Active,
    /// A stored breakup has not been surfaced yet; the next turn delivers
    /// the breakup message and flips to `AwaitingFriendAgreement`.
    BreakupJustOccurred,
    /// Ex-mode: only a transition to friendship is on the table.
    AwaitingFriendAgreement,
    /// Post-agreement friendship; conversation is unrestricted but framed
    /// as non-romantic.
    Friends,
}
