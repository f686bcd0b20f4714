//! LLM module: chat-completion capability and its OpenAI-compatible HTTP client
//!
//! This module provides:
//! - `ChatCompletion`, the capability trait the answer pipeline depends on
//! - `ChatRequest`, one system/user prompt pair with sampling bounds
//! - `ChatClientConfig`, `ChatClient` for talking to OpenAI-compatible backends

mod client;

pub use client::{ChatClient, ChatClientConfig};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One chat-completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Chat-completion capability
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Return the assistant text for `request`.
    /// A single attempt: retry policy belongs to the caller.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
