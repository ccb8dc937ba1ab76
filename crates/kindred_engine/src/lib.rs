pub mod cache;
pub mod compose;
pub mod detectors;
pub mod identity;
pub mod lifecycle;
pub mod llm;
pub mod pipeline;
pub mod provider;
pub mod ratelimit;
pub mod retry;
pub mod transport;

pub use llm::{Completion, LlmClient};
pub use pipeline::{InboundOutcome, MessageEngine, ReplyChannel, TurnKind};
pub use transport::{DeliveryResult, SmsTransport};
