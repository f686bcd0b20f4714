use crate::{PodiumError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ChatCompletion, ChatRequest};

/// Longest provider error body kept in error messages
const MAX_ERROR_BODY: usize = 300;

/// Configuration for ChatClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String, // e.g., https://api.openai.com/v1
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("QA_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

/// HTTP client for OpenAI-compatible `/chat/completions`
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    cfg: ChatClientConfig,
}

impl ChatClient {
    pub fn new(cfg: ChatClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| PodiumError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    /// Client from environment, or `None` when no API key is configured.
    pub fn from_env() -> Option<Self> {
        let cfg = ChatClientConfig::default();
        if cfg.api_key.is_none() {
            warn!(target = "llm_client", "OPENAI_API_KEY not set; chat capability unavailable");
            return None;
        }
        match Self::new(cfg) {
            Ok(client) => {
                info!(target = "llm_client", base_url = %client.cfg.base_url, "Chat client initialized");
                Some(client)
            }
            Err(e) => {
                error!(target = "llm_client", error = %e, "Chat client unavailable");
                None
            }
        }
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.cfg
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let chat_url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        debug!(
            target = "llm_client",
            model = %request.model,
            "POST {} via Chat Completions", chat_url
        );

        let mut req = self
            .http
            .post(&chat_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let resp = req.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                PodiumError::Timeout(self.cfg.request_timeout_ms)
            } else {
                PodiumError::ProviderFailure(format!("Chat Completions HTTP error: {e}"))
            }
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target = "llm_client", %status, body = %truncate(&text, MAX_ERROR_BODY), "Chat Completions error");
            return Err(PodiumError::ProviderFailure(format!(
                "Chat Completions error: status={} body={}",
                status,
                truncate(&text, MAX_ERROR_BODY)
            )));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            PodiumError::ProviderFailure(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        let text = extract_text_from_chat_completions(&val).ok_or_else(|| {
            PodiumError::ProviderFailure(
                "Missing choices[0].message.content in chat completions".into(),
            )
        })?;
        Ok(text.trim().to_string())
    }
}

pub(crate) fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let v = json!({
            "choices": [{"message": {"role": "assistant", "content": " 5 May 2021 "}}]
        });
        assert_eq!(
            extract_text_from_chat_completions(&v).as_deref(),
            Some(" 5 May 2021 ")
        );
        assert!(extract_text_from_chat_completions(&json!({"choices": []})).is_none());
    }

    #[test]
    fn truncates_long_bodies() {
        let long = "x".repeat(500);
        let t = truncate(&long, 10);
        assert_eq!(t.chars().count(), 11);
        assert_eq!(truncate("short", 10), "short");
    }
}
