//! Speech synthesis capabilities.
//!
//! - [`OpenAiSpeech`]: remote `/audio/speech` provider (primary stage)
//! - [`CliSpeech`]: on-device Piper or espeak-ng (local fallback stage)

#[cfg(feature = "local-tts")]
mod cli;
mod openai;

#[cfg(feature = "local-tts")]
pub use cli::{CliSpeech, CliSpeechConfig};
pub use openai::{OpenAiSpeech, OpenAiSpeechConfig};

use async_trait::async_trait;
use podium_core::Result;
use serde::{Deserialize, Serialize};

/// Per-request voice preferences. Unset fields use the engine's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub voice: Option<String>,
    /// Speech rate multiplier (0.5–2.0)
    #[serde(default = "default_rate")]
    pub rate: f32,
    /// Output gain (0.5–2.0); only applied by local engines
    #[serde(default = "default_rate")]
    pub volume: f32,
}

fn default_rate() -> f32 {
    1.0
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: None,
            rate: 1.0,
            volume: 1.0,
        }
    }
}

/// A single synthesis request; transient, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub language: String,
    pub voice: VoiceConfig,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        let language: String = language.into();
        Self {
            text: text.into(),
            language: podium_core::normalize_language(&language),
            voice: VoiceConfig::default(),
        }
    }

    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = voice;
        self
    }
}

/// Text-to-speech engine producing WAV bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}
