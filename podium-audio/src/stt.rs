//! Speech-to-text.
//!
//! [`TranscriptionService`] passes an optional language hint to the engine and,
//! when the engine rejects the hint as unsupported, retries exactly once
//! without it. Whatever fails after that is surfaced as
//! `Speech recognition failed (<kind>): <message>`.

use async_trait::async_trait;
use podium_core::{redact_secrets, PodiumError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Transcript returned when no engine is configured
pub const OFFLINE_TRANSCRIPT: &str = "Бул тест транскрипциясы. API ачкычын коюңуз.";

/// Speech recognition engine
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe `audio`; `filename` carries the container format.
    /// Returns `PodiumError::UnsupportedLanguage` when the hint is rejected.
    async fn transcribe(&self, audio: &[u8], filename: &str, language_hint: Option<&str>) -> Result<String>;
}

/// Transcription with the one-shot language-hint retry
pub struct TranscriptionService {
    engine: Option<Arc<dyn Transcriber>>,
    default_hint: Option<String>,
}

impl TranscriptionService {
    pub fn new(engine: Option<Arc<dyn Transcriber>>) -> Self {
        Self {
            engine,
            default_hint: None,
        }
    }

    /// Service from environment: Whisper API when a key is set, hint from STT_LANGUAGE.
    #[cfg(feature = "stt")]
    pub fn from_env() -> Self {
        let engine = WhisperApi::from_env().map(|w| Arc::new(w) as Arc<dyn Transcriber>);
        let hint = std::env::var("STT_LANGUAGE")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        Self::new(engine).with_default_hint(hint)
    }

    /// Hint used when the caller passes none
    pub fn with_default_hint(mut self, hint: Option<String>) -> Self {
        self.default_hint = hint;
        self
    }

    pub async fn transcribe(&self, audio: &[u8], filename: &str, language_hint: Option<&str>) -> Result<String> {
        if audio.is_empty() {
            return Err(surface(PodiumError::ProviderFailure("empty audio payload".into())));
        }
        let Some(engine) = self.engine.as_ref() else {
            warn!(target = "stt", "No transcription engine configured; returning offline transcript");
            return Ok(OFFLINE_TRANSCRIPT.to_string());
        };

        let hint = language_hint
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .or_else(|| self.default_hint.clone());

        let first = engine.transcribe(audio, filename, hint.as_deref()).await;
        let result = match first {
            Err(PodiumError::UnsupportedLanguage(msg)) if hint.is_some() => {
                warn!(
                    target = "stt",
                    engine = engine.name(),
                    hint = hint.as_deref().unwrap_or_default(),
                    reason = %msg,
                    "Language hint rejected; retrying with auto-detection"
                );
                engine.transcribe(audio, filename, None).await
            }
            other => other,
        };

        match result {
            Ok(text) => {
                info!(target = "stt", engine = engine.name(), chars = text.chars().count(), "Transcribed");
                Ok(text.trim().to_string())
            }
            Err(e) => {
                warn!(target = "stt", engine = engine.name(), kind = e.kind(), error = %e, "Transcription failed");
                Err(surface(e))
            }
        }
    }
}

/// Wrap an engine error into the user-facing form, keeping its class.
fn surface(e: PodiumError) -> PodiumError {
    let kind = e.kind();
    let msg = match &e {
        PodiumError::UnsupportedLanguage(m)
        | PodiumError::ProviderFailure(m)
        | PodiumError::ProviderUnavailable(m) => m.trim().to_string(),
        other => other.to_string(),
    };
    let msg = if msg.is_empty() { "Unknown error".to_string() } else { redact_secrets(&msg) };
    let text = format!("Speech recognition failed ({kind}): {msg}");
    match e {
        PodiumError::UnsupportedLanguage(_) => PodiumError::UnsupportedLanguage(text),
        _ => PodiumError::ProviderFailure(text),
    }
}

#[cfg(feature = "stt")]
pub use whisper::{WhisperApi, WhisperConfig};

#[cfg(feature = "stt")]
mod whisper {
    use super::Transcriber;
    use async_trait::async_trait;
    use podium_core::{PodiumError, Result};
    use reqwest::multipart::{Form, Part};
    use reqwest::Client;
    use std::time::Duration;
    use tracing::{debug, info, warn};

    const MAX_ERROR_BODY: usize = 300;

    /// Whisper API configuration (env: OPENAI_*, STT_MODEL, STT_TIMEOUT_MS)
    #[derive(Debug, Clone)]
    pub struct WhisperConfig {
        pub base_url: String,
        pub api_key: Option<String>,
        pub model: String,
        pub request_timeout_ms: u64,
    }

    impl Default for WhisperConfig {
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
                model: std::env::var("STT_MODEL")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "whisper-1".to_string()),
                request_timeout_ms: std::env::var("STT_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60_000),
            }
        }
    }

    /// OpenAI-compatible `/audio/transcriptions` client
    pub struct WhisperApi {
        http: Client,
        cfg: WhisperConfig,
    }

    impl WhisperApi {
        pub fn new(cfg: WhisperConfig) -> Result<Self> {
            let http = Client::builder()
                .timeout(Duration::from_millis(cfg.request_timeout_ms))
                .build()
                .map_err(|e| PodiumError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
            Ok(Self { http, cfg })
        }

        pub fn from_env() -> Option<Self> {
            let cfg = WhisperConfig::default();
            if cfg.api_key.is_none() {
                warn!(target = "stt", "OPENAI_API_KEY not set; Whisper API unavailable");
                return None;
            }
            match Self::new(cfg) {
                Ok(w) => {
                    info!(target = "stt", model = %w.cfg.model, "Whisper API client initialized");
                    Some(w)
                }
                Err(e) => {
                    warn!(target = "stt", error = %e, "Whisper API client unavailable");
                    None
                }
            }
        }
    }

    /// Whether a provider error body rejects the requested language
    pub(crate) fn is_unsupported_language(body: &str) -> bool {
        body.contains("unsupported_language") || body.contains("is not supported")
    }

    #[async_trait]
    impl Transcriber for WhisperApi {
        fn name(&self) -> &str {
            "whisper-api"
        }

        async fn transcribe(&self, audio: &[u8], filename: &str, language_hint: Option<&str>) -> Result<String> {
            let url = format!("{}/audio/transcriptions", self.cfg.base_url.trim_end_matches('/'));
            let part = Part::bytes(audio.to_vec())
                .file_name(filename.to_string())
                .mime_str("application/octet-stream")
                .map_err(|e| PodiumError::ProviderFailure(format!("invalid multipart part: {e}")))?;
            let mut form = Form::new()
                .text("model", self.cfg.model.clone())
                .part("file", part);
            if let Some(lang) = language_hint {
                form = form.text("language", lang.to_string());
            }
            debug!(target = "stt", hint = language_hint.unwrap_or("auto"), bytes = audio.len(), "POST {}", url);

            let mut req = self.http.post(&url);
            if let Some(key) = &self.cfg.api_key {
                req = req.bearer_auth(key);
            }
            let resp = req.multipart(form).send().await.map_err(|e| {
                if e.is_timeout() {
                    PodiumError::Timeout(self.cfg.request_timeout_ms)
                } else {
                    PodiumError::ProviderFailure(format!("transcription HTTP error: {e}"))
                }
            })?;

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if !status.is_success() {
                let body: String = body.chars().take(MAX_ERROR_BODY).collect();
                if is_unsupported_language(&body) {
                    return Err(PodiumError::UnsupportedLanguage(body));
                }
                return Err(PodiumError::ProviderFailure(format!(
                    "status={} body={}",
                    status, body
                )));
            }

            let val: serde_json::Value = serde_json::from_str(&body)?;
            val.get("text")
                .and_then(|t| t.as_str())
                .map(|t| t.to_string())
                .ok_or_else(|| PodiumError::ProviderFailure("missing `text` in transcription response".into()))
        }
    }

}
