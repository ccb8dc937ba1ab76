//! Conversation buffer policy: when to append, when compaction is due.

use kindred_core::{ChatMessage, UserRecord, MAX_HISTORY};

/// Why a compaction fires this turn. At most one compaction invocation per
/// turn; hitting the hard cap takes precedence over the periodic refresh
/// even though the cap length also satisfies the periodic condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionTrigger {
    /// Every `refresh_every` messages: refresh summary/profile, keep the
    /// history so short-term context survives.
    Periodic,
    /// History reached `MAX_HISTORY`: fold everything into the summary and
    /// clear the buffer.
    HardCap,
}

pub fn push(record: &mut UserRecord, message: ChatMessage) {
    record.history.push(message);
}

/// Decide whether compaction is due at the current history length.
pub fn compaction_due(len: usize, refresh_every: usize) -> Option<CompactionTrigger> {
    if len >= MAX_HISTORY {
        return Some(CompactionTrigger::HardCap);
    }
    if len > 0 && refresh_every > 0 && len % refresh_every == 0 {
        return Some(CompactionTrigger::Periodic);
    }
    None
}
