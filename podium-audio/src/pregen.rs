//! Deck audio pre-generation.
//!
//! Walks a deck in order and makes sure every slide has a real audio artifact
//! at `{root}/{language}/{deck}/slide_{id:02}.wav`. An artifact larger than the
//! placeholder threshold counts as real and is left alone unless `force` is
//! set; anything smaller (a silence placeholder, a truncated write) is redone.
//! Synthesis goes through [`SpeechService`], so cached audio is reused and a
//! slide never costs more than one provider call per run. A forced run skips
//! the cache and re-renders every slide.

use crate::speech::{SpeechService, SpeechSource};
use crate::synth::VoiceConfig;
use async_trait::async_trait;
use podium_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Artifacts at or below this size are treated as placeholders.
/// One second of 22.05 kHz silence is 44,144 bytes.
pub const DEFAULT_PLACEHOLDER_THRESHOLD: u64 = 50_000;

/// One slide of a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckItem {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Narration text; falls back to `content` when absent or blank
    #[serde(default)]
    pub tts: Option<String>,
}

impl DeckItem {
    pub fn speech_text(&self) -> &str {
        match self.tts.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub slides: Vec<DeckItem>,
}

impl Deck {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }
}

/// Where pre-generated audio lives
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    fn path_for(&self, language: &str, deck: &str, slide_id: u32) -> PathBuf;

    /// Size in bytes, `None` when absent
    async fn size(&self, path: &Path) -> Option<u64>;

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Artifact store on the local filesystem
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { root: root.into() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// `slide_01.wav`, `slide_12.wav`, `slide_105.wav`
pub fn artifact_file_name(slide_id: u32) -> String {
    format!("slide_{:02}.wav", slide_id)
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn path_for(&self, language: &str, deck: &str, slide_id: u32) -> PathBuf {
        self.root
            .join(language)
            .join(deck)
            .join(artifact_file_name(slide_id))
    }

    async fn size(&self, path: &Path) -> Option<u64> {
        tokio::fs::metadata(path)
            .await
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a half-written artifact behind
        let tmp = path.with_extension("wav.part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PregenConfig {
    pub language: String,
    pub deck: String,
    /// Regenerate even when a real artifact or cached audio exists
    pub force: bool,
    pub placeholder_threshold: u64,
    pub voice: VoiceConfig,
}

impl PregenConfig {
    pub fn new(language: impl Into<String>, deck: impl Into<String>) -> Self {
        Self {
            language: podium_core::normalize_language(&language.into()),
            deck: deck.into(),
            force: false,
            placeholder_threshold: DEFAULT_PLACEHOLDER_THRESHOLD,
            voice: VoiceConfig::default(),
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = voice;
        self
    }
}

/// What happened to one slide
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PregenAction {
    /// Real artifact already present
    Skipped,
    /// Audio written; `from_cache` when no provider was called
    Generated { from_cache: bool },
    /// Every stage failed; silence written so the deck still plays
    Placeholder { reason: String },
    /// Slide has no text to speak
    NoText,
    Failed { error: String },
}

/// Per-slide record of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PregenManifestEntry {
    pub slide_id: u32,
    pub expected_filename: String,
    /// Size of the artifact found before this run touched it
    pub existing_size_bytes: Option<u64>,
    #[serde(flatten)]
    pub action: PregenAction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PregenReport {
    pub entries: Vec<PregenManifestEntry>,
}

impl PregenReport {
    fn count(&self, pred: impl Fn(&PregenAction) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.action)).count()
    }

    pub fn generated(&self) -> usize {
        self.count(|a| matches!(a, PregenAction::Generated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|a| matches!(a, PregenAction::Skipped))
    }

    pub fn placeholders(&self) -> usize {
        self.count(|a| matches!(a, PregenAction::Placeholder { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|a| matches!(a, PregenAction::Failed { .. }))
    }
}

pub struct BatchPregenerator {
    speech: Arc<SpeechService>,
    store: Arc<dyn ArtifactStore>,
}

impl BatchPregenerator {
    pub fn new(speech: Arc<SpeechService>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { speech, store }
    }

    /// Process `items` in order; individual failures are recorded and skipped past.
    pub async fn run(&self, items: &[DeckItem], cfg: &PregenConfig) -> PregenReport {
        info!(
            target = "pregen",
            language = %cfg.language,
            deck = %cfg.deck,
            slides = items.len(),
            force = cfg.force,
            "Pre-generating deck audio"
        );

        let mut report = PregenReport::default();
        for item in items {
            let entry = self.process(item, cfg).await;
            match &entry.action {
                PregenAction::Failed { error } => {
                    error!(target = "pregen", slide_id = item.id, error = %error, "Slide failed")
                }
                PregenAction::Placeholder { reason } => {
                    warn!(target = "pregen", slide_id = item.id, reason = %reason, "Wrote silence placeholder")
                }
                action => debug!(target = "pregen", slide_id = item.id, ?action, "Slide done"),
            }
            report.entries.push(entry);
        }

        info!(
            target = "pregen",
            generated = report.generated(),
            skipped = report.skipped(),
            placeholders = report.placeholders(),
            failed = report.failed(),
            "Pre-generation finished"
        );
        report
    }

    async fn process(&self, item: &DeckItem, cfg: &PregenConfig) -> PregenManifestEntry {
        let path = self.store.path_for(&cfg.language, &cfg.deck, item.id);
        let existing = self.store.size(&path).await;
        let mut entry = PregenManifestEntry {
            slide_id: item.id,
            expected_filename: artifact_file_name(item.id),
            existing_size_bytes: existing,
            action: PregenAction::Skipped,
        };

        if !cfg.force && existing.is_some_and(|size| size > cfg.placeholder_threshold) {
            return entry;
        }

        let text = item.speech_text();
        if text.trim().is_empty() {
            entry.action = PregenAction::NoText;
            return entry;
        }

        let speech = if cfg.force {
            self.speech
                .refresh(text, &cfg.language, cfg.voice.clone())
                .await
        } else {
            self.speech
                .speak_with_voice(text, &cfg.language, cfg.voice.clone())
                .await
        };
        if let Err(e) = self.store.write(&path, &speech.audio).await {
            entry.action = PregenAction::Failed { error: e.summary() };
            return entry;
        }

        entry.action = match speech.source {
            SpeechSource::Silence => PregenAction::Placeholder {
                reason: speech.reason.unwrap_or_default(),
            },
            SpeechSource::Cache => PregenAction::Generated { from_cache: true },
            SpeechSource::Synthesized(_) => PregenAction::Generated { from_cache: false },
        };
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_text_prefers_tts_field() {
        let mut item = DeckItem {
            id: 1,
            title: "Кириш".into(),
            content: "Мазмун".into(),
            tts: Some("Үн тексти".into()),
        };
        assert_eq!(item.speech_text(), "Үн тексти");
        item.tts = Some("   ".into());
        assert_eq!(item.speech_text(), "Мазмун");
        item.tts = None;
        assert_eq!(item.speech_text(), "Мазмун");
    }

    #[test]
    fn test_deck_json() {
        let deck = Deck::from_json(r#"{"slides":[{"id":1,"title":"A","content":"B"},{"id":2,"tts":"C"}]}"#)
            .unwrap();
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[1].speech_text(), "C");
    }

    #[test]
    fn test_layout() {
        let store = FsArtifactStore::new("/srv/audio");
        assert_eq!(
            store.path_for("ky", "constitution", 3),
            PathBuf::from("/srv/audio/ky/constitution/slide_03.wav")
        );
        assert_eq!(artifact_file_name(12), "slide_12.wav");
    }
}
