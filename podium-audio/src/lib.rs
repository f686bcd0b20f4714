// Podium audio capabilities: synthesis chain, transcription, deck pre-generation

pub(crate) mod utils;

pub mod fallback;
pub mod pregen;
pub mod speech;
pub mod stt;
pub mod synth;
pub mod wav;

pub use fallback::{FallbackConfig, FallbackOutcome, FallbackSynthesizer, Stage};
pub use pregen::{
    ArtifactStore, BatchPregenerator, Deck, DeckItem, FsArtifactStore, PregenAction, PregenConfig,
    PregenManifestEntry, PregenReport,
};
pub use speech::{SpeechResult, SpeechService, SpeechSource};
pub use stt::{Transcriber, TranscriptionService};
#[cfg(feature = "stt")]
pub use stt::{WhisperApi, WhisperConfig};
pub use synth::{SpeechSynthesizer, SynthesisRequest, VoiceConfig};
