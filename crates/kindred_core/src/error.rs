//! Engine error taxonomy.
//!
//! Only hard failures live here. Soft conditions (compaction parse failure,
//! classifier errors) are absorbed where they occur and never surface as an
//! `EngineError` — see the compactor and detector modules.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Sender normalized to fewer than 10 or more than 15 digits. Rejected
    /// before any lookup.
    #[error("invalid sender identity: {0:?}")]
    InvalidIdentity(String),

    /// Every known storage format was tried and none matched. The SMS path
    /// acks silently on this; replying would invite retry loops.
    #[error("no user found for identity {0}")]
    UserNotFound(String),

    /// Sliding-window admission denied. Signaled upstream before any AI or
    /// persistence work.
    #[error("rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("backing store failure")]
    Store(#[from] anyhow::Error),

    #[error("language model failure: {0}")]
    Llm(String),

    #[error("outbound transport failure: {0}")]
    Transport(String),
}

impl EngineError {
    /// Whether this failure may mutate no state by contract.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidIdentity(_)
                | EngineError::UserNotFound(_)
                | EngineError::RateLimited(_)
        )
    }
}
