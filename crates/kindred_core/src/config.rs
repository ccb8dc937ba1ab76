use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KindredConfig {
    pub llm: LlmConfig,
    pub sms: SmsConfig,
    pub cache: CacheConfig,
    pub rate: RateConfig,
    pub memory: MemoryConfig,
    pub lifecycle: LifecycleConfig,
    pub server: ServerConfig,
    pub db_path: DbConfig,
}

impl KindredConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: KindredConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults
    /// with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KINDRED_DB") {
            self.db_path.path = v;
        }
        if let Ok(v) = std::env::var("KINDRED_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SMS_ACCOUNT_SID") {
            self.sms.account_sid = Some(v);
        }
        if let Ok(v) = std::env::var("SMS_AUTH_TOKEN") {
            self.sms.auth_token = Some(v);
        }
        if let Ok(v) = std::env::var("SMS_FROM_NUMBER") {
            self.sms.from_number = v;
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Read from LLM_API_KEY when unset; the provider falls back to a mock
    /// response when no key is configured at all.
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Bound on a single completion call, including retries.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            max_tokens: 512,
            temperature: 0.8,
            timeout_secs: 45,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// Number outbound replies are sent from.
    pub from_number: String,
    /// Carrier REST endpoint the transport posts to.
    pub carrier_url: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Hard ceiling on outbound body length; the composer truncates on
    /// sentence boundaries to stay under it.
    pub max_reply_len: usize,
    pub send_timeout_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            from_number: String::new(),
            carrier_url: String::new(),
            account_sid: None,
            auth_token: None,
            max_reply_len: 320,
            send_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub window_secs: u64,
    pub max_messages: usize,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_messages: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Every N messages, refresh summary/profile without clearing history.
    pub refresh_every: usize,
    pub compact_timeout_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            refresh_every: 5,
            compact_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Silence longer than this counts as neglect for romantic kinds.
    pub neglect_hours: i64,
    /// Gate for the external lying/unacceptable classifiers. Neglect
    /// detection is local and always on.
    pub classifiers_enabled: bool,
    pub classifier_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            neglect_hours: 24,
            classifiers_enabled: true,
            classifier_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8321,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: "kindred.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract_constants() {
        let cfg = KindredConfig::default();
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert_eq!(cfg.cache.capacity, 1000);
        assert_eq!(cfg.rate.window_secs, 60);
        assert_eq!(cfg.rate.max_messages, 10);
        assert_eq!(cfg.memory.refresh_every, 5);
        assert_eq!(cfg.lifecycle.neglect_hours, 24);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: KindredConfig = toml::from_str(
            r#"
            [rate]
            max_messages = 3

            [sms]
            from_number = "12015550100"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rate.max_messages, 3);
        assert_eq!(cfg.rate.window_secs, 60);
        assert_eq!(cfg.sms.from_number, "12015550100");
        assert_eq!(cfg.cache.capacity, 1000);
    }
}
