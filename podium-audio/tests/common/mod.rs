#![allow(dead_code)]

use async_trait::async_trait;
use podium_audio::wav::encode_wav_pcm16;
use podium_audio::{SpeechSynthesizer, SynthesisRequest};
use podium_core::{PodiumError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a fake synthesizer behaves on every call
#[derive(Clone)]
pub enum Behavior {
    /// Valid WAV of `samples` non-zero frames
    Wav { samples: usize },
    Fail,
    /// Returns bytes that are not a WAV container
    Garbage,
    Slow(Duration),
    /// No usable engine for the request, like a local CLI without a voice
    Unavailable,
}

pub struct FakeSynth {
    pub name: &'static str,
    pub behavior: Behavior,
    pub calls: AtomicUsize,
}

impl FakeSynth {
    pub fn new(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn tone(samples: usize) -> Vec<u8> {
    let pcm: Vec<i16> = (0..samples).map(|i| ((i % 64) as i16 - 32) * 512).collect();
    encode_wav_pcm16(&pcm, 22_050, 1)
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn name(&self) -> &str {
        self.name
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Wav { samples } => {
                // Give concurrent callers time to pile up
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(tone(*samples))
            }
            Behavior::Fail => Err(PodiumError::ProviderFailure(
                "status=500 body=upstream error".into(),
            )),
            Behavior::Garbage => Ok(b"<html>rate limited</html>".to_vec()),
            Behavior::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(tone(100))
            }
            Behavior::Unavailable => Err(PodiumError::ProviderUnavailable(
                "no voice for language".into(),
            )),
        }
    }
}
