//! Cached, de-duplicated speech synthesis.
//!
//! `speak` = single-flight per [`ContentKey`] → cache lookup → fallback chain →
//! cache store. Only delivered audio is cached; silence placeholders are not,
//! so a later request retries the providers. `refresh` skips the lookup and
//! overwrites whatever rendering was cached.

use crate::fallback::{FallbackOutcome, FallbackSynthesizer, Stage};
use crate::synth::{SynthesisRequest, VoiceConfig};
use crate::wav::{silence_wav, SILENCE_SAMPLE_RATE};
use podium_core::{ContentKey, ContentKind, RequestCoordinator, ResultCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Where the audio of a [`SpeechResult`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSource {
    Cache,
    Synthesized(Stage),
    Silence,
}

#[derive(Debug, Clone)]
pub struct SpeechResult {
    pub audio: Arc<[u8]>,
    pub source: SpeechSource,
    /// Why the placeholder was produced, for `Silence`
    pub reason: Option<String>,
}

impl SpeechResult {
    pub fn is_silence(&self) -> bool {
        self.source == SpeechSource::Silence
    }
}

pub struct SpeechService {
    cache: Arc<ResultCache>,
    synth: Arc<FallbackSynthesizer>,
    flights: RequestCoordinator<SpeechResult>,
    /// Kept apart from `flights` so a refresh never joins a cache-served flight
    refreshes: RequestCoordinator<SpeechResult>,
    ttl: Duration,
}

impl SpeechService {
    pub fn new(cache: Arc<ResultCache>, synth: Arc<FallbackSynthesizer>) -> Self {
        Self {
            cache,
            synth,
            flights: RequestCoordinator::new(),
            refreshes: RequestCoordinator::new(),
            ttl: ContentKind::Tts.default_ttl(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Speech for `text` in `language` with default voice settings.
    pub async fn speak(&self, text: &str, language: &str) -> SpeechResult {
        self.speak_with(SynthesisRequest::new(text, language), true)
            .await
    }

    /// Voice settings do not take part in the cache key: one cached rendering per
    /// `(language, text)`.
    pub async fn speak_with_voice(&self, text: &str, language: &str, voice: VoiceConfig) -> SpeechResult {
        self.speak_with(SynthesisRequest::new(text, language).with_voice(voice), true)
            .await
    }

    /// Always run the fallback chain, ignoring any cached rendering. Delivered
    /// audio replaces the cache entry.
    pub async fn refresh(&self, text: &str, language: &str, voice: VoiceConfig) -> SpeechResult {
        self.speak_with(SynthesisRequest::new(text, language).with_voice(voice), false)
            .await
    }

    async fn speak_with(&self, request: SynthesisRequest, use_cache: bool) -> SpeechResult {
        let key = ContentKey::tts(&request.language, &request.text);
        let flights = if use_cache {
            &self.flights
        } else {
            &self.refreshes
        };
        let cache = Arc::clone(&self.cache);
        let synth = Arc::clone(&self.synth);
        let ttl = self.ttl;
        let flight_key = key.clone();

        let outcome = flights
            .run(key, move || async move {
                if use_cache {
                    if let Some(audio) = cache.get(&flight_key).await {
                        debug!(target = "tts", key = %flight_key, "Speech cache hit");
                        return SpeechResult {
                            audio: audio.into(),
                            source: SpeechSource::Cache,
                            reason: None,
                        };
                    }
                }
                match synth.synthesize(&request).await {
                    FallbackOutcome::Delivered { audio, stage } => {
                        cache.set(&flight_key, &audio, ttl).await;
                        SpeechResult {
                            audio: audio.into(),
                            source: SpeechSource::Synthesized(stage),
                            reason: None,
                        }
                    }
                    FallbackOutcome::Silence { audio, reason } => SpeechResult {
                        audio: audio.into(),
                        source: SpeechSource::Silence,
                        reason: Some(reason),
                    },
                }
            })
            .await;

        outcome.unwrap_or_else(|e| {
            error!(target = "tts", error = %e, "Speech computation aborted");
            SpeechResult {
                audio: silence_wav(Duration::from_secs(1), SILENCE_SAMPLE_RATE).into(),
                source: SpeechSource::Silence,
                reason: Some(e.summary()),
            }
        })
    }
}
