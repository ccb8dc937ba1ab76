pub mod server;
pub mod transport;
pub mod types;

pub use server::{router, run, AppState};
pub use transport::{HttpSmsTransport, LoggingTransport};
