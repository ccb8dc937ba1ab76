//! HTTP LLM provider speaking the messages API shape.
//!
//! When no API key is configured the client answers with a canned mock
//! reply, so the whole pipeline runs locally without credentials.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kindred_core::config::LlmConfig;
use kindred_core::{ChatMessage, Role};
use reqwest::Client;
use serde_json::json;

use crate::llm::{Completion, LlmClient};
use crate::retry::{with_backoff, RetryPolicy};

pub struct HttpLlmClient {
    client: Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            retry: RetryPolicy::default(),
        }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<Completion> {
        let api_key = match &self.config.api_key {
            Some(key) => key.clone(),
            None => {
                tracing::debug!("No LLM API key configured, returning mock completion");
                return Ok(Completion {
                    content: "(mock) Got it — tell me more?".to_string(),
                    tokens_used: 0,
                });
            }
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system,
            "messages": messages
                .iter()
                .map(|m| json!({"role": Self::role_str(m.role), "content": m.content}))
                .collect::<Vec<_>>(),
        });

        let response = with_backoff(&self.retry, "LLM provider", || async {
            self.client
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await
                .context("Failed to reach LLM provider")
        })
        .await?;

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Failed to read LLM response body")?;

        let content = payload["content"][0]["text"]
            .as_str()
            .context("LLM response missing content text")?
            .to_string();
        let tokens_used = payload["usage"]["input_tokens"].as_u64().unwrap_or(0)
            + payload["usage"]["output_tokens"].as_u64().unwrap_or(0);

        Ok(Completion {
            content,
            tokens_used,
        })
    }
}
