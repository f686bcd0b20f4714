use super::{SpeechSynthesizer, SynthesisRequest};
use async_trait::async_trait;
use podium_core::{PodiumError, Result};
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_ERROR_BODY: usize = 300;

/// Remote speech provider configuration (env: OPENAI_*, TTS_*)
#[derive(Debug, Clone)]
pub struct OpenAiSpeechConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Voice used when neither the request nor `language_voices` names one
    pub voice: String,
    /// Voice profile per language code (env: TTS_VOICE_KY, TTS_VOICE_RU, TTS_VOICE_EN)
    pub language_voices: HashMap<String, String>,
    pub request_timeout_ms: u64,
}

impl Default for OpenAiSpeechConfig {
    fn default() -> Self {
        let mut language_voices = HashMap::new();
        for lang in ["ky", "ru", "en"] {
            if let Some(v) = std::env::var(format!("TTS_VOICE_{}", lang.to_uppercase()))
                .ok()
                .filter(|s| !s.trim().is_empty())
            {
                language_voices.insert(lang.to_string(), v.trim().to_string());
            }
        }
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            model: std::env::var("TTS_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "tts-1-hd".to_string()),
            voice: std::env::var("TTS_VOICE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "onyx".to_string()),
            language_voices,
            request_timeout_ms: std::env::var("TTS_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

/// OpenAI-compatible `/audio/speech` client returning WAV
pub struct OpenAiSpeech {
    http: Client,
    cfg: OpenAiSpeechConfig,
}

impl OpenAiSpeech {
    pub fn new(cfg: OpenAiSpeechConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| PodiumError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    /// Provider from environment, or `None` when no API key is configured.
    pub fn from_env() -> Option<Self> {
        let cfg = OpenAiSpeechConfig::default();
        if cfg.api_key.is_none() {
            warn!(target = "tts", "OPENAI_API_KEY not set; remote speech unavailable");
            return None;
        }
        match Self::new(cfg) {
            Ok(s) => {
                info!(target = "tts", model = %s.cfg.model, voice = %s.cfg.voice, "Remote speech provider initialized");
                Some(s)
            }
            Err(e) => {
                error!(target = "tts", error = %e, "Remote speech provider unavailable");
                None
            }
        }
    }

    pub fn config(&self) -> &OpenAiSpeechConfig {
        &self.cfg
    }

    /// Voice for a request: explicit request voice, then language profile, then default.
    pub fn voice_for(&self, request: &SynthesisRequest) -> String {
        request
            .voice
            .voice
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.cfg.language_voices.get(&request.language).cloned())
            .unwrap_or_else(|| self.cfg.voice.clone())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.cfg.base_url.trim_end_matches('/'));
        let voice = self.voice_for(request);
        debug!(target = "tts", model = %self.cfg.model, voice = %voice, chars = request.text.chars().count(), "POST {}", url);

        let mut req = self.http.post(&url);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        let body = json!({
            "model": self.cfg.model,
            "input": request.text,
            "voice": voice,
            "response_format": "wav",
            "speed": request.voice.rate.clamp(0.5, 2.0),
        });

        let resp = req.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                PodiumError::Timeout(self.cfg.request_timeout_ms)
            } else {
                PodiumError::ProviderFailure(format!("speech HTTP error: {e}"))
            }
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let text: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(PodiumError::ProviderFailure(format!(
                "speech error: status={} body={}",
                status, text
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PodiumError::ProviderFailure(format!("speech body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
