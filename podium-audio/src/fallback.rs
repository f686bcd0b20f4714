//! Ordered speech synthesis chain: Primary → LocalFallback → Silence.
//!
//! Each configured stage is attempted at most once, with a bounded timeout.
//! A stage that is not configured is skipped without counting as an attempt.
//! Provider output must be a WAV with sample data, otherwise the stage failed.
//! Silence is the terminal stage and cannot fail, so `synthesize` is total.

use crate::synth::{SpeechSynthesizer, SynthesisRequest};
use crate::utils::now_ms;
use crate::wav::{silence_wav, validate_wav, SILENCE_SAMPLE_RATE};
use podium_core::PodiumError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Primary,
    LocalFallback,
    Silence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Primary => "primary",
            Stage::LocalFallback => "local_fallback",
            Stage::Silence => "silence",
        }
    }
}

/// Terminal result of one synthesis request
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackOutcome {
    Delivered { audio: Vec<u8>, stage: Stage },
    /// Placeholder audio; `reason` lists why every stage was skipped or failed
    Silence { audio: Vec<u8>, reason: String },
}

impl FallbackOutcome {
    pub fn audio(&self) -> &[u8] {
        match self {
            FallbackOutcome::Delivered { audio, .. } | FallbackOutcome::Silence { audio, .. } => audio,
        }
    }

    pub fn into_audio(self) -> Vec<u8> {
        match self {
            FallbackOutcome::Delivered { audio, .. } | FallbackOutcome::Silence { audio, .. } => audio,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            FallbackOutcome::Delivered { stage, .. } => *stage,
            FallbackOutcome::Silence { .. } => Stage::Silence,
        }
    }

    pub fn is_silence(&self) -> bool {
        matches!(self, FallbackOutcome::Silence { .. })
    }
}

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Upper bound on a single stage attempt (env: TTS_TIMEOUT_MS)
    pub stage_timeout: Duration,
    pub silence_duration: Duration,
    pub silence_sample_rate: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_millis(
                std::env::var("TTS_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30_000),
            ),
            silence_duration: Duration::from_secs(1),
            silence_sample_rate: SILENCE_SAMPLE_RATE,
        }
    }
}

pub struct FallbackSynthesizer {
    primary: Option<Arc<dyn SpeechSynthesizer>>,
    local: Option<Arc<dyn SpeechSynthesizer>>,
    cfg: FallbackConfig,
}

impl FallbackSynthesizer {
    pub fn new(
        primary: Option<Arc<dyn SpeechSynthesizer>>,
        local: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            primary,
            local,
            cfg: FallbackConfig::default(),
        }
    }

    /// Chain from environment: remote provider when a key is set, local CLI engine when installed.
    pub fn from_env() -> Self {
        let primary = crate::synth::OpenAiSpeech::from_env()
            .map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>);
        #[cfg(feature = "local-tts")]
        let local = crate::synth::CliSpeech::detect().map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>);
        #[cfg(not(feature = "local-tts"))]
        let local: Option<Arc<dyn SpeechSynthesizer>> = None;
        Self::new(primary, local)
    }

    pub fn with_config(mut self, cfg: FallbackConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Stages that may run for a request, in order
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::with_capacity(3);
        if self.primary.is_some() {
            stages.push(Stage::Primary);
        }
        if self.local.is_some() {
            stages.push(Stage::LocalFallback);
        }
        stages.push(Stage::Silence);
        stages
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> FallbackOutcome {
        if request.text.trim().is_empty() {
            return self.silence("empty text".into());
        }

        let chain = [
            (Stage::Primary, self.primary.as_ref()),
            (Stage::LocalFallback, self.local.as_ref()),
        ];
        let mut failures = Vec::new();

        for (stage, provider) in chain {
            let Some(provider) = provider else {
                debug!(target = "tts", stage = stage.as_str(), "Stage not configured; skipping");
                failures.push(format!("{}: not configured", stage.as_str()));
                continue;
            };

            let t0 = now_ms();
            match self.attempt(provider.as_ref(), request).await {
                Ok(audio) => {
                    info!(
                        target = "tts",
                        stage = stage.as_str(),
                        provider = provider.name(),
                        language = %request.language,
                        bytes = audio.len(),
                        elapsed_ms = now_ms() - t0,
                        "Speech synthesized"
                    );
                    return FallbackOutcome::Delivered { audio, stage };
                }
                Err(PodiumError::ProviderUnavailable(why)) => {
                    debug!(
                        target = "tts",
                        stage = stage.as_str(),
                        provider = provider.name(),
                        reason = %why,
                        "Stage unavailable; skipping"
                    );
                    failures.push(format!("{}: unavailable", stage.as_str()));
                }
                Err(e) => {
                    warn!(
                        target = "tts",
                        stage = stage.as_str(),
                        provider = provider.name(),
                        kind = e.kind(),
                        error = %e,
                        "Synthesis stage failed; falling through"
                    );
                    failures.push(format!("{}: {}", stage.as_str(), e.summary()));
                }
            }
        }

        self.silence(failures.join("; "))
    }

    async fn attempt(
        &self,
        provider: &dyn SpeechSynthesizer,
        request: &SynthesisRequest,
    ) -> podium_core::Result<Vec<u8>> {
        let audio = tokio::time::timeout(self.cfg.stage_timeout, provider.synthesize(request))
            .await
            .map_err(|_| PodiumError::Timeout(self.cfg.stage_timeout.as_millis() as u64))??;
        validate_wav(&audio)?;
        Ok(audio)
    }

    fn silence(&self, reason: String) -> FallbackOutcome {
        warn!(target = "tts", reason = %reason, "Returning silence placeholder");
        FallbackOutcome::Silence {
            audio: silence_wav(self.cfg.silence_duration, self.cfg.silence_sample_rate),
            reason,
        }
    }
}
