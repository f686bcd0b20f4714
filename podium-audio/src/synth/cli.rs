//! On-device synthesis through local CLI engines.
//!
//! - Prefer Piper (higher quality, requires a voice model)
//! - Otherwise espeak-ng (widely available, ships a Kyrgyz voice)
//!
//! Env overrides:
//! - PIPER_BIN, PIPER_VOICE, PIPER_VOICE_DIR
//! - ESPEAK_BIN
//! - TTS_TEMP_DIR

use super::{SpeechSynthesizer, SynthesisRequest};
use crate::utils::gen_id;
use crate::wav::scale_pcm16_in_place;
use async_trait::async_trait;
use podium_core::{PodiumError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::task;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct CliSpeechConfig {
    pub temp_dir: PathBuf,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    /// Directory searched for `{voice}.onnx` or `{language}.onnx`
    pub piper_voice_dir: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
}

impl Default for CliSpeechConfig {
    fn default() -> Self {
        let temp_dir = std::env::var("TTS_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        let piper_bin = get_from_env_or_path("PIPER_BIN", "piper");
        let piper_voice = std::env::var("PIPER_VOICE").ok().map(PathBuf::from);
        let piper_voice_dir = std::env::var("PIPER_VOICE_DIR").ok().map(PathBuf::from);
        let espeak_bin =
            get_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| get_from_path("espeak"));

        Self {
            temp_dir,
            piper_bin,
            piper_voice,
            piper_voice_dir,
            espeak_bin,
        }
    }
}

fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    if let Some(paths_os) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths_os) {
            let candidate = dir.join(bin);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Piper,
    Espeak,
}

/// Local fallback engine
pub struct CliSpeech {
    cfg: CliSpeechConfig,
}

impl CliSpeech {
    pub fn new(cfg: CliSpeechConfig) -> Self {
        Self { cfg }
    }

    /// Engine from environment/PATH, or `None` when no binary is installed.
    pub fn detect() -> Option<Self> {
        let cfg = CliSpeechConfig::default();
        if let Some(ref p) = cfg.piper_bin {
            info!(target = "tts", bin = ?p, "Detected Piper binary");
        }
        if let Some(ref e) = cfg.espeak_bin {
            info!(target = "tts", bin = ?e, "Detected espeak-ng binary");
        }
        if cfg.piper_bin.is_none() && cfg.espeak_bin.is_none() {
            info!(target = "tts", "No local TTS engine found");
            return None;
        }
        Some(Self::new(cfg))
    }

    fn select_engine(&self, request: &SynthesisRequest) -> Option<(Engine, Option<PathBuf>)> {
        if self.cfg.piper_bin.is_some() {
            if let Some(voice) = resolve_piper_voice_path(&self.cfg, request) {
                return Some((Engine::Piper, Some(voice)));
            }
        }
        self.cfg.espeak_bin.as_ref().map(|_| (Engine::Espeak, None))
    }
}

#[async_trait]
impl SpeechSynthesizer for CliSpeech {
    fn name(&self) -> &str {
        "local-cli"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let (engine, piper_voice) = self.select_engine(request).ok_or_else(|| {
            PodiumError::ProviderUnavailable(
                "no usable local engine (Piper voice missing and espeak-ng not found)".into(),
            )
        })?;

        let cfg = self.cfg.clone();
        let request = request.clone();
        task::spawn_blocking(move || -> Result<Vec<u8>> {
            let wav_path = cfg.temp_dir.join(format!("tts_{}.wav", gen_id()));
            let synth = match (engine, piper_voice) {
                (Engine::Piper, Some(voice)) => synth_with_piper(&cfg, &voice, &request, &wav_path),
                _ => synth_with_espeak(&cfg, &request, &wav_path),
            };
            let audio = synth.and_then(|_| std::fs::read(&wav_path).map_err(PodiumError::IoError));
            // Temp file is ours whatever happened
            let _ = std::fs::remove_file(&wav_path);
            let mut audio = audio?;

            // espeak-ng applies amplitude itself
            let volume = request.voice.volume.clamp(0.5, 2.0);
            if engine == Engine::Piper && (volume - 1.0).abs() > f32::EPSILON {
                scale_pcm16_in_place(&mut audio, volume)?;
            }
            Ok(audio)
        })
        .await
        .map_err(|e| PodiumError::ProviderFailure(format!("local synthesis task failed: {e}")))?
    }
}

fn resolve_piper_voice_path(cfg: &CliSpeechConfig, request: &SynthesisRequest) -> Option<PathBuf> {
    if let Some(v) = &cfg.piper_voice {
        return Some(v.clone());
    }
    let dir = cfg.piper_voice_dir.as_ref()?;
    let names = request
        .voice
        .voice
        .iter()
        .map(|s| s.as_str())
        .chain(std::iter::once(request.language.as_str()));
    for name in names {
        let direct = dir.join(name);
        if direct.is_file() {
            return Some(direct);
        }
        for ext in ["onnx", "onnx.gz"] {
            let c = dir.join(format!("{}.{}", name, ext));
            if c.exists() {
                return Some(c);
            }
        }
    }
    None
}

fn synth_with_piper(
    cfg: &CliSpeechConfig,
    voice_path: &Path,
    request: &SynthesisRequest,
    out_wav: &Path,
) -> Result<()> {
    let piper = cfg
        .piper_bin
        .as_ref()
        .ok_or_else(|| PodiumError::ProviderUnavailable("Piper binary not found".into()))?;

    let mut cmd = Command::new(piper);
    cmd.arg("-m").arg(voice_path);
    cmd.arg("-f").arg(out_wav);
    let length_scale = (1.0f32 / request.voice.rate.clamp(0.5, 2.0)).clamp(0.5, 2.0);
    cmd.arg("--length_scale").arg(format!("{:.2}", length_scale));
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(target = "tts", command = ?cmd, "Running piper");
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(request.text.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(PodiumError::ProviderFailure(format!(
            "Piper failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

fn synth_with_espeak(cfg: &CliSpeechConfig, request: &SynthesisRequest, out_wav: &Path) -> Result<()> {
    let espeak = cfg
        .espeak_bin
        .as_ref()
        .ok_or_else(|| PodiumError::ProviderUnavailable("espeak-ng not found".into()))?;
    let voice = request
        .voice
        .voice
        .clone()
        .unwrap_or_else(|| request.language.clone());
    let wpm = (160.0 * request.voice.rate).round().clamp(80.0, 450.0) as i32;
    let amp = (100.0 * request.voice.volume).round().clamp(50.0, 200.0) as i32;

    let mut cmd = Command::new(espeak);
    cmd.arg("-v").arg(&voice);
    cmd.arg("-s").arg(wpm.to_string());
    cmd.arg("-a").arg(amp.to_string());
    cmd.arg("-w").arg(out_wav);
    cmd.arg(&request.text);
    debug!(target = "tts", command = ?cmd, "Running espeak-ng");
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(PodiumError::ProviderFailure(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(dir: &Path) -> CliSpeechConfig {
        CliSpeechConfig {
            temp_dir: dir.to_path_buf(),
            piper_bin: Some(PathBuf::from("/nonexistent/piper")),
            piper_voice: None,
            piper_voice_dir: Some(dir.to_path_buf()),
            espeak_bin: None,
        }
    }

    #[test]
    fn test_piper_voice_by_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ky.onnx"), b"model").unwrap();
        let speech = CliSpeech::new(cfg(dir.path()));

        let (engine, voice) = speech
            .select_engine(&SynthesisRequest::new("Салам", "ky"))
            .unwrap();
        assert_eq!(engine, Engine::Piper);
        assert_eq!(voice.unwrap(), dir.path().join("ky.onnx"));

        // No Russian model and no espeak-ng
        assert!(speech.select_engine(&SynthesisRequest::new("Привет", "ru")).is_none());
    }

    #[tokio::test]
    async fn test_unusable_engine_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let speech = CliSpeech::new(cfg(dir.path()));
        let err = speech
            .synthesize(&SynthesisRequest::new("Привет", "ru"))
            .await
            .unwrap_err();
        assert!(matches!(err, PodiumError::ProviderUnavailable(_)));
    }
}
