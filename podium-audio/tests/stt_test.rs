use async_trait::async_trait;
use podium_audio::stt::OFFLINE_TRANSCRIPT;
use podium_audio::{Transcriber, TranscriptionService};
use podium_core::{PodiumError, Result};
use std::sync::Arc;
use std::sync::Mutex;

// Records the hint of every call; rejects the listed languages
struct FakeWhisper {
    rejects: Vec<&'static str>,
    hints: Mutex<Vec<Option<String>>>,
    fail_all: bool,
}

impl FakeWhisper {
    fn new(rejects: Vec<&'static str>) -> Self {
        Self {
            rejects,
            hints: Mutex::new(Vec::new()),
            fail_all: false,
        }
    }

    fn hints(&self) -> Vec<Option<String>> {
        self.hints.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FakeWhisper {
    fn name(&self) -> &str {
        "fake-whisper"
    }

    async fn transcribe(&self, _audio: &[u8], _filename: &str, language_hint: Option<&str>) -> Result<String> {
        self.hints.lock().unwrap().push(language_hint.map(str::to_string));
        if self.fail_all {
            return Err(PodiumError::ProviderFailure(
                "status=401 body=Incorrect API key provided: sk-proj-abcdef".into(),
            ));
        }
        match language_hint {
            Some(h) if self.rejects.iter().any(|r| *r == h) => Err(PodiumError::UnsupportedLanguage(format!(
                "Language '{h}' is not supported"
            ))),
            _ => Ok(" Саламатсызбы \n".to_string()),
        }
    }
}

#[tokio::test]
async fn rejected_hint_is_retried_without_it() {
    let engine = Arc::new(FakeWhisper::new(vec!["ky"]));
    let service = TranscriptionService::new(Some(engine.clone() as Arc<dyn Transcriber>));

    let text = service.transcribe(b"RIFF", "audio.wav", Some("ky")).await.unwrap();
    assert_eq!(text, "Саламатсызбы");
    assert_eq!(engine.hints(), vec![Some("ky".to_string()), None]);
}

#[tokio::test]
async fn accepted_hint_is_used_once() {
    let engine = Arc::new(FakeWhisper::new(vec!["ky"]));
    let service = TranscriptionService::new(Some(engine.clone() as Arc<dyn Transcriber>));

    service.transcribe(b"RIFF", "audio.webm", Some("RU")).await.unwrap();
    assert_eq!(engine.hints(), vec![Some("ru".to_string())]);
}

#[tokio::test]
async fn default_hint_applies_when_caller_gives_none() {
    let engine = Arc::new(FakeWhisper::new(vec![]));
    let service = TranscriptionService::new(Some(engine.clone() as Arc<dyn Transcriber>))
        .with_default_hint(Some("ru".into()));

    service.transcribe(b"RIFF", "audio.wav", None).await.unwrap();
    assert_eq!(engine.hints(), vec![Some("ru".to_string())]);
}

#[tokio::test]
async fn errors_are_surfaced_with_kind_and_redacted() {
    let engine = Arc::new(FakeWhisper {
        fail_all: true,
        ..FakeWhisper::new(vec![])
    });
    let service = TranscriptionService::new(Some(engine.clone() as Arc<dyn Transcriber>));

    let err = service
        .transcribe(b"RIFF", "audio.wav", Some("ky"))
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Speech recognition failed (ProviderFailure):"), "{msg}");
    assert!(!msg.contains("abcdef"), "{msg}");
    // Only unsupported-language errors trigger the retry
    assert_eq!(engine.hints().len(), 1);
}

#[tokio::test]
async fn empty_audio_is_rejected_up_front() {
    let engine = Arc::new(FakeWhisper::new(vec![]));
    let service = TranscriptionService::new(Some(engine.clone() as Arc<dyn Transcriber>));

    assert!(service.transcribe(b"", "audio.wav", None).await.is_err());
    assert!(engine.hints().is_empty());
}

#[tokio::test]
async fn no_engine_returns_offline_transcript() {
    let service = TranscriptionService::new(None);
    let text = service.transcribe(b"RIFF", "audio.wav", None).await.unwrap();
    assert_eq!(text, OFFLINE_TRANSCRIPT);
}
