use std::fs;
use std::path::{Path, PathBuf};

use podium_audio::pregen::DEFAULT_PLACEHOLDER_THRESHOLD;
use podium_audio::VoiceConfig;

/// Which cache store backs the speech cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Rocksdb,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// RocksDB directory
    pub path: PathBuf,
    /// Purge expired entries this often; `None` disables the sweeper
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: match std::env::var("PODIUM_CACHE").as_deref() {
                Ok("rocksdb") => CacheBackend::Rocksdb,
                _ => CacheBackend::Memory,
            },
            path: std::env::var("PODIUM_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".podium-cache")),
            sweep_interval_secs: None,
        }
    }
}

/// High-level configuration for the pre-generation run
#[derive(Clone, Debug)]
pub struct PregenAppConfig {
    pub audio_root: PathBuf,
    pub language: String,
    pub deck_name: String,
    pub placeholder_threshold: u64,
    pub stage_timeout_ms: Option<u64>,
    pub voice: VoiceConfig,
    pub cache: CacheConfig,
}

impl Default for PregenAppConfig {
    fn default() -> Self {
        Self {
            audio_root: std::env::var("PODIUM_AUDIO_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/audio")),
            language: std::env::var("PODIUM_LANGUAGE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "ky".to_string()),
            deck_name: std::env::var("PODIUM_DECK")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "default".to_string()),
            placeholder_threshold: DEFAULT_PLACEHOLDER_THRESHOLD,
            stage_timeout_ms: None,
            voice: VoiceConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl PregenAppConfig {
    /// Load configuration from a TOML file (`path`, else PODIUM_PREGEN_CONFIG, else ./pregen.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load(path: Option<&str>) -> Self {
        let default = Self::default();
        let path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("PODIUM_PREGEN_CONFIG").ok())
            .unwrap_or_else(|| "pregen.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "pregen", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s, default),
            Err(e) => {
                tracing::warn!(target = "pregen", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str, default: Self) -> Self {
        match toml::from_str::<PregenToml>(s) {
            Ok(t) => t.overlay(default),
            Err(e) => {
                tracing::warn!(target = "pregen", error = %e, "Failed to parse TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct PregenToml {
    pub audio_root: Option<PathBuf>,
    pub language: Option<String>,
    pub deck_name: Option<String>,
    pub placeholder_threshold: Option<u64>,
    pub tts: Option<TtsToml>,
    pub cache: Option<CacheToml>,
}

impl PregenToml {
    fn overlay(self, mut base: PregenAppConfig) -> PregenAppConfig {
        if let Some(x) = self.audio_root {
            base.audio_root = x;
        }
        if let Some(x) = self.language {
            base.language = x;
        }
        if let Some(x) = self.deck_name {
            base.deck_name = x;
        }
        if let Some(x) = self.placeholder_threshold {
            base.placeholder_threshold = x;
        }
        if let Some(t) = self.tts {
            t.apply(&mut base);
        }
        if let Some(c) = self.cache {
            c.apply(&mut base.cache);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TtsToml {
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub volume: Option<f32>,
    pub stage_timeout_ms: Option<u64>,
}
impl TtsToml {
    fn apply(self, base: &mut PregenAppConfig) {
        if let Some(v) = self.voice {
            base.voice.voice = Some(v);
        }
        if let Some(v) = self.rate {
            base.voice.rate = v.clamp(0.5, 2.0);
        }
        if let Some(v) = self.volume {
            base.voice.volume = v.clamp(0.5, 2.0);
        }
        if let Some(v) = self.stage_timeout_ms {
            base.stage_timeout_ms = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CacheToml {
    pub backend: Option<CacheBackend>,
    pub path: Option<PathBuf>,
    pub sweep_interval_secs: Option<u64>,
}
impl CacheToml {
    fn apply(self, c: &mut CacheConfig) {
        if let Some(x) = self.backend {
            c.backend = x;
        }
        if let Some(x) = self.path {
            c.path = x;
        }
        if let Some(x) = self.sweep_interval_secs {
            c.sweep_interval_secs = Some(x).filter(|s| *s > 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn overlay_replaces_only_given_fields() {
        std::env::remove_var("PODIUM_LANGUAGE");
        std::env::remove_var("PODIUM_CACHE");
        let cfg = PregenAppConfig::from_toml_str(
            r#"
                language = "ru"
                placeholder_threshold = 60000

                [tts]
                voice = "alloy"
                rate = 5.0

                [cache]
                backend = "rocksdb"
                sweep_interval_secs = 0
            "#,
            PregenAppConfig::default(),
        );
        assert_eq!(cfg.language, "ru");
        assert_eq!(cfg.deck_name, PregenAppConfig::default().deck_name);
        assert_eq!(cfg.placeholder_threshold, 60_000);
        assert_eq!(cfg.voice.voice.as_deref(), Some("alloy"));
        assert_eq!(cfg.voice.rate, 2.0);
        assert_eq!(cfg.cache.backend, CacheBackend::Rocksdb);
        assert_eq!(cfg.cache.sweep_interval_secs, None);
    }

    #[test]
    #[serial]
    fn invalid_toml_keeps_defaults() {
        std::env::remove_var("PODIUM_LANGUAGE");
        let cfg = PregenAppConfig::from_toml_str("language = [", PregenAppConfig::default());
        assert_eq!(cfg.language, "ky");
    }

    #[test]
    #[serial]
    fn missing_file_uses_env() {
        std::env::set_var("PODIUM_LANGUAGE", "en");
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let cfg = PregenAppConfig::load(missing.to_str());
        assert_eq!(cfg.language, "en");
        std::env::remove_var("PODIUM_LANGUAGE");
    }
}
