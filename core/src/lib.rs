// Podium Core Library
// Content-addressed cache, single-flight coordination and the answer pipeline

pub mod cache;
pub mod coordinator;
pub mod key;
pub mod llm;
pub mod qa;
pub mod telemetry;

// Export core types
pub use cache::{CacheEntry, CacheStats, CacheStore, Clock, ManualClock, MemoryStore, ResultCache, SystemClock};
pub use coordinator::RequestCoordinator;
pub use key::{ContentKey, ContentKind};
pub use llm::{ChatClient, ChatClientConfig, ChatCompletion, ChatRequest};
pub use qa::{Answer, AnswerResolver, AnswerSource, OverrideTable, QaConfig, Question};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodiumError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Provider failure: {0}")]
    ProviderFailure(String),

    #[error("Provider timed out after {0}ms")]
    Timeout(u64),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Coordinator error: {0}")]
    CoordinatorError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl PodiumError {
    /// Short machine-friendly name of the error class, used in user-facing summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PodiumError::ProviderUnavailable(_) => "ProviderUnavailable",
            PodiumError::ProviderFailure(_) => "ProviderFailure",
            PodiumError::Timeout(_) => "Timeout",
            PodiumError::CacheUnavailable(_) => "CacheUnavailable",
            PodiumError::UnsupportedLanguage(_) => "UnsupportedLanguage",
            PodiumError::CoordinatorError(_) => "CoordinatorError",
            PodiumError::ConfigError(_) => "ConfigError",
            PodiumError::IoError(_) => "IoError",
            PodiumError::SerializationError(_) => "SerializationError",
        }
    }

    /// Terse `Kind: message` line safe to show to end users: credentials are
    /// masked and the message is capped at [`SUMMARY_MAX_CHARS`].
    pub fn summary(&self) -> String {
        let msg = redact_secrets(&self.to_string());
        let msg: String = if msg.chars().count() > SUMMARY_MAX_CHARS {
            msg.chars().take(SUMMARY_MAX_CHARS).chain(std::iter::once('…')).collect()
        } else {
            msg
        };
        format!("{}: {}", self.kind(), msg)
    }
}

/// Longest error message carried in user-facing summaries
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Mask API keys and bearer tokens in free text.
pub fn redact_secrets(text: &str) -> String {
    let mut out = Vec::new();
    let mut mask_next = false;
    for word in text.split(' ') {
        if mask_next {
            out.push("***".to_string());
            mask_next = false;
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") {
            mask_next = true;
            out.push(word.to_string());
        } else if let Some(pos) = word.find("sk-") {
            out.push(format!("{}sk-***", &word[..pos]));
        } else {
            out.push(word.to_string());
        }
    }
    out.join(" ")
}

pub type Result<T> = std::result::Result<T, PodiumError>;

/// Normalize a language code: trimmed, lower-cased, `ky` when empty.
pub fn normalize_language(language: &str) -> String {
    let lang = language.trim().to_lowercase();
    if lang.is_empty() {
        "ky".to_string()
    } else {
        lang
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(" RU "), "ru");
        assert_eq!(normalize_language(""), "ky");
    }

    #[test]
    fn test_summary_masks_keys() {
        let err = PodiumError::ProviderFailure(
            "status=401 body=Incorrect API key provided: sk-abc123XYZ. Authorization: Bearer sk-zzz".into(),
        );
        let s = err.summary();
        assert!(s.starts_with("ProviderFailure: "));
        assert!(!s.contains("abc123XYZ"));
        assert!(!s.contains("sk-zzz"));
    }

    #[test]
    fn test_summary_is_truncated() {
        let err = PodiumError::ProviderFailure("x".repeat(1000));
        assert!(err.summary().chars().count() <= SUMMARY_MAX_CHARS + "ProviderFailure: ".len() + 1);
    }
}
