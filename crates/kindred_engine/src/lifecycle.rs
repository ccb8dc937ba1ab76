//! Relationship lifecycle transitions.
//!
//! `plan_turn` is a pure function from (stored state, message, detector
//! signal) to the action for this turn. Every transition is guarded on the
//! derived current state, so redelivered messages can't apply a transition
//! twice: once `last_breakup` is cleared the surface branch is unreachable,
//! and once `ex_mode` reflects the target state only the ex-negotiation
//! branches apply.

use kindred_core::{BreakupReason, LifecycleState, RelationshipKind, UserRecord};

/// What the pipeline should do with this turn. Everything except `Chat`
/// returns early without touching the chat-completion collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPlan {
    /// Surface the stored breakup: clear `last_breakup`, set `ex_mode`,
    /// reply with the one-time acknowledgment.
    SurfaceBreakup { previous: RelationshipKind },
    /// Ex agreed to friendship: clear `ex_mode`, re-frame as Friend.
    AcceptFriendship,
    /// Ex tried to rekindle the romance: refuse, state unchanged.
    RefuseRomance,
    /// Ex said something else: restate the friends-only offer.
    ClarifyFriendsOnly,
    /// A detector fired this turn: record the breakup and deliver it.
    Breakup { reason: BreakupReason },
    /// Normal conversation.
    Chat,
}

const AFFIRMATIVE_TOKENS: &[&str] = &["yes", "yeah", "yep", "sure", "ok", "okay"];

const ROMANTIC_TOKENS: &[&str] = &[
    "love",
    "miss you",
    "relationship",
    "date",
    "romance",
    "girlfriend",
    "boyfriend",
];

/// Token check with word boundaries: "date" must not match "update" and
/// "yes" must not match "yesterday". Multi-word tokens match as substrings
/// over the whitespace-normalized text.
fn contains_token(text: &str, token: &str) -> bool {
    let lowered = text.to_lowercase();
    if token.contains(' ') {
        let normalized = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
        return normalized.contains(token);
    }
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == token)
}

fn agrees_to_friendship(text: &str) -> bool {
    contains_token(text, "friend") || contains_token(text, "friends")
}

fn is_affirmative(text: &str) -> bool {
    AFFIRMATIVE_TOKENS.iter().any(|t| contains_token(text, t))
}

fn seeks_romance(text: &str) -> bool {
    ROMANTIC_TOKENS.iter().any(|t| contains_token(text, t))
}

/// Decide this turn's action from the derived lifecycle state.
///
/// `signal` is the detector outcome, already evaluated only when the caller
/// saw an Active romantic relationship with no pending breakup.
pub fn plan_turn(record: &UserRecord, message: &str, signal: Option<BreakupReason>) -> TurnPlan {
    match record.lifecycle() {
        LifecycleState::BreakupJustOccurred => {
            let previous = record
                .last_breakup
                .as_ref()
                .map(|b| b.previous)
                .unwrap_or(record.relationship);
            TurnPlan::SurfaceBreakup { previous }
        }
        LifecycleState::AwaitingFriendAgreement => {
            if is_affirmative(message) && agrees_to_friendship(message) {
                TurnPlan::AcceptFriendship
            } else if seeks_romance(message) {
                TurnPlan::RefuseRomance
            } else {
                TurnPlan::ClarifyFriendsOnly
            }
        }
        LifecycleState::Active | LifecycleState::Friends => match signal {
            // Guarded again here: a signal can only become a breakup from a
            // romantic Active state with nothing already pending.
            Some(reason)
                if record.relationship.is_romantic() && record.last_breakup.is_none() =>
            {
                TurnPlan::Breakup { reason }
            }
            _ => TurnPlan::Chat,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kindred_core::{BreakupRecord, PersonalityKind};

    fn record(kind: RelationshipKind) -> UserRecord {
        UserRecord::new("12012675068", kind, PersonalityKind::Sunny)
    }

    fn ex_record() -> UserRecord {
        let mut r = record(RelationshipKind::Girlfriend);
        r.ex_mode = true;
        r
    }

    #[test]
    fn token_matching_respects_word_boundaries() {
        assert!(contains_token("yes, why not", "yes"));
        assert!(!contains_token("yesterday was fun", "yes"));
        assert!(contains_token("want to go on a date?", "date"));
        assert!(!contains_token("any update on that?", "date"));
        assert!(contains_token("I miss  you a lot", "miss you"));
        assert!(!contains_token("I'll miss the bus", "miss you"));
    }

    #[test]
    fn pending_breakup_surfaces_with_previous_kind() {
        let mut r = record(RelationshipKind::Boyfriend);
        r.last_breakup = Some(BreakupRecord {
            date: Utc::now(),
            previous: RelationshipKind::Boyfriend,
            reason: BreakupReason::Neglect,
        });
        assert_eq!(
            plan_turn(&r, "hello??", None),
            TurnPlan::SurfaceBreakup {
                previous: RelationshipKind::Boyfriend
            }
        );
    }

    #[test]
    fn surfacing_is_idempotent_after_acknowledgment() {
        // Same inbound message replayed after last_breakup was cleared and
        // ex_mode set: the ex-negotiation branch handles it, there is no
        // second acknowledgment.
        let r = ex_record();
        assert_eq!(plan_turn(&r, "hello??", None), TurnPlan::ClarifyFriendsOnly);
    }

    #[test]
    fn friend_agreement_needs_affirmation_and_the_word() {
        let r = ex_record();
        assert_eq!(
            plan_turn(&r, "yes let's be friends", None),
            TurnPlan::AcceptFriendship
        );
        assert_eq!(plan_turn(&r, "friends?", None), TurnPlan::ClarifyFriendsOnly);
        assert_eq!(plan_turn(&r, "yes", None), TurnPlan::ClarifyFriendsOnly);
    }

    #[test]
    fn rekindling_is_refused() {
        let r = ex_record();
        assert_eq!(plan_turn(&r, "but I love you", None), TurnPlan::RefuseRomance);
        assert_eq!(plan_turn(&r, "i miss you so much", None), TurnPlan::RefuseRomance);
        assert_eq!(
            plan_turn(&r, "can we go on a date", None),
            TurnPlan::RefuseRomance
        );
    }

    #[test]
    fn detector_signal_becomes_breakup_only_for_romantic_active() {
        let r = record(RelationshipKind::Girlfriend);
        assert_eq!(
            plan_turn(&r, "hey", Some(BreakupReason::Neglect)),
            TurnPlan::Breakup {
                reason: BreakupReason::Neglect
            }
        );

        let mom = record(RelationshipKind::Mom);
        assert_eq!(plan_turn(&mom, "hey", Some(BreakupReason::Neglect)), TurnPlan::Chat);
    }

    #[test]
    fn no_signal_means_chat() {
        let r = record(RelationshipKind::Boyfriend);
        assert_eq!(plan_turn(&r, "good morning", None), TurnPlan::Chat);
    }
}
