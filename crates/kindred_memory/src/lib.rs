pub mod buffer;
pub mod compactor;
pub mod store;

pub use buffer::CompactionTrigger;
pub use compactor::{
    Compactor, CompactionOutcome, ParseError, ProfileUpdate, Summarizer, SUMMARIZER_SYSTEM_PROMPT,
};
pub use store::{MemoryUserStore, SqliteUserStore, UserStore};
