//! Question answering: fact overrides, cached answers and the chat provider.
//!
//! Resolution order for every question:
//! 1. deterministic override table (never cached, always authoritative)
//! 2. result cache, keyed by `(qa, language, "{slide_id}:{question}")`
//! 3. a single chat-completion call, stored with the answer TTL on success
//! 4. a localized apology carrying a terse, redacted error summary

mod overrides;
mod prompt;
mod resolver;

pub use overrides::{OverrideRule, OverrideTable};
pub use prompt::{build_prompts, PromptLanguage};
pub use resolver::AnswerResolver;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Answer pipeline configuration (env: QA_MODEL, QA_ALLOW_GENERAL)
#[derive(Debug, Clone)]
pub struct QaConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Answer from general knowledge when context is thin; otherwise ask for clarification
    pub allow_general: bool,
    pub ttl: Duration,
    /// Upper bound on one provider call
    pub timeout: Duration,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            model: std::env::var("QA_MODEL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            max_tokens: 500,
            temperature: 0.3,
            allow_general: std::env::var("QA_ALLOW_GENERAL")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            ttl: crate::ContentKind::Qa.default_ttl(),
            timeout: Duration::from_millis(
                std::env::var("QA_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30_000),
            ),
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// A question asked about a slide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub slide_id: u32,
    #[serde(default)]
    pub language: String,
}

impl Question {
    pub fn new(question: impl Into<String>, slide_id: u32, language: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: String::new(),
            slide_id,
            language: language.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerSource {
    Override,
    Cache,
    Provider,
    /// No chat capability configured
    Offline,
    /// The provider call failed; the text is an apology
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

/// Cached representation of a provider answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CachedAnswer {
    pub question: String,
    pub answer: String,
    pub slide_id: u32,
    pub language: String,
}
