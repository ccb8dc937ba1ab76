pub mod config;
pub mod error;
pub mod persona;
pub mod user;

pub use config::KindredConfig;
pub use error::EngineError;
pub use user::{
    BreakupReason, BreakupRecord, ChatMessage, LifecycleState, PersonalityKind,
    RelationshipKind, Role, UserRecord, MAX_HISTORY,
};
