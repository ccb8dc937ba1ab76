//! kindred — SMS companion server.
//!
//! Wires the engine together from config and runs the gateway: identity
//! resolution, session cache, rate limiting, conversation memory with
//! compaction, the relationship lifecycle, and the carrier edges.

use anyhow::Result;
use clap::Parser;
use kindred_core::KindredConfig;
use kindred_engine::cache::TtlCache;
use kindred_engine::detectors::{LlmClassifier, NoSignalClassifier, BehaviorClassifier};
use kindred_engine::provider::HttpLlmClient;
use kindred_engine::ratelimit::SlidingWindowLimiter;
use kindred_engine::{LlmClient, MessageEngine, SmsTransport};
use kindred_gateway::{HttpSmsTransport, LoggingTransport};
use kindred_memory::SqliteUserStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kindred", version, about)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "kindred.toml")]
    config: String,

    /// SQLite database path (overrides config)
    #[arg(short, long, env = "KINDRED_DB")]
    db: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = KindredConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.db_path.path = db;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("Opening user store at {}", config.db_path.path);
    let store = Arc::new(SqliteUserStore::new(&config.db_path.path).await?);

    let cache = Arc::new(TtlCache::new(
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.capacity,
    ));
    let limiter = Arc::new(SlidingWindowLimiter::new(
        Duration::from_secs(config.rate.window_secs),
        config.rate.max_messages,
    ));

    let llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(config.llm.clone()));
    if config.llm.api_key.is_none() {
        info!("No LLM API key configured; completions will be mocked");
    }

    let classifier: Arc<dyn BehaviorClassifier> = if config.lifecycle.classifiers_enabled {
        Arc::new(LlmClassifier::new(llm.clone()))
    } else {
        info!("Behavior classifiers disabled; only neglect detection is active");
        Arc::new(NoSignalClassifier)
    };

    let transport: Arc<dyn SmsTransport> = if config.sms.carrier_url.is_empty() {
        info!("No SMS carrier configured; outbound messages will be logged only");
        Arc::new(LoggingTransport)
    } else {
        Arc::new(HttpSmsTransport::new(config.sms.clone()))
    };

    let engine = Arc::new(MessageEngine::new(
        store,
        cache,
        limiter,
        llm,
        classifier,
        transport,
        config.clone(),
    ));

    kindred_gateway::run(engine, &config.server.host, config.server.port).await
}
