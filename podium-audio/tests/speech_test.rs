mod common;

use chrono::Utc;
use common::{Behavior, FakeSynth};
use podium_audio::{FallbackSynthesizer, SpeechService, SpeechSource, SpeechSynthesizer, Stage};
use podium_core::{ContentKey, ManualClock, MemoryStore, ResultCache};
use std::sync::Arc;
use std::time::Duration;

async fn service(primary: Arc<FakeSynth>, local: Option<Arc<FakeSynth>>) -> (Arc<SpeechService>, Arc<ResultCache>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = Arc::new(ResultCache::connect_with_clock(MemoryStore::new(), clock.clone()).await);
    let synth = FallbackSynthesizer::new(
        Some(primary as Arc<dyn SpeechSynthesizer>),
        local.map(|l| l as Arc<dyn SpeechSynthesizer>),
    );
    let service = Arc::new(SpeechService::new(Arc::clone(&cache), Arc::new(synth)));
    (service, cache, clock)
}

#[tokio::test]
async fn concurrent_identical_requests_call_primary_once() {
    let primary = Arc::new(FakeSynth::new("primary", Behavior::Wav { samples: 4000 }));
    let (service, _, _) = service(primary.clone(), None).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.speak("Кош келиңиздер", "ky").await }));
    }
    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }

    assert_eq!(primary.calls(), 1);
    let first = &results[0].audio;
    assert!(results.iter().all(|r| &r.audio == first));
    // Late joiners may find the finished result in the cache instead
    assert!(results.iter().all(|r| matches!(
        r.source,
        SpeechSource::Synthesized(Stage::Primary) | SpeechSource::Cache
    )));
}

#[tokio::test]
async fn delivered_audio_is_cached_for_a_day() {
    let primary = Arc::new(FakeSynth::new("primary", Behavior::Wav { samples: 100 }));
    let (service, cache, clock) = service(primary.clone(), None).await;

    let first = service.speak("Салам", "KY").await;
    assert_eq!(first.source, SpeechSource::Synthesized(Stage::Primary));
    assert!(cache.get(&ContentKey::tts("ky", "Салам")).await.is_some());

    let second = service.speak("Салам", "ky").await;
    assert_eq!(second.source, SpeechSource::Cache);
    assert_eq!(second.audio, first.audio);
    assert_eq!(primary.calls(), 1);

    clock.advance(Duration::from_secs(86_401));
    let third = service.speak("Салам", "ky").await;
    assert_eq!(third.source, SpeechSource::Synthesized(Stage::Primary));
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn silence_is_not_cached() {
    let primary = Arc::new(FakeSynth::new("primary", Behavior::Fail));
    let (service, cache, _) = service(primary.clone(), None).await;

    let first = service.speak("Салам", "ky").await;
    assert!(first.is_silence());
    assert!(first.reason.is_some());
    assert!(cache.get(&ContentKey::tts("ky", "Салам")).await.is_none());

    service.speak("Салам", "ky").await;
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn local_fallback_audio_is_cached() {
    let primary = Arc::new(FakeSynth::new("primary", Behavior::Fail));
    let local = Arc::new(FakeSynth::new("local", Behavior::Wav { samples: 100 }));
    let (service, _, _) = service(primary.clone(), Some(local.clone())).await;

    let first = service.speak("Привет", "ru").await;
    assert_eq!(first.source, SpeechSource::Synthesized(Stage::LocalFallback));
    let second = service.speak("Привет", "ru").await;
    assert_eq!(second.source, SpeechSource::Cache);
    assert_eq!(local.calls(), 1);
}

#[tokio::test]
async fn works_with_cache_disabled() {
    let primary = Arc::new(FakeSynth::new("primary", Behavior::Wav { samples: 100 }));
    let synth = FallbackSynthesizer::new(Some(primary.clone() as Arc<dyn SpeechSynthesizer>), None);
    let service = SpeechService::new(Arc::new(ResultCache::disabled()), Arc::new(synth));

    service.speak("a", "ky").await;
    let again = service.speak("a", "ky").await;
    assert_eq!(again.source, SpeechSource::Synthesized(Stage::Primary));
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn refresh_skips_the_cache_and_overwrites_it() {
    let primary = Arc::new(FakeSynth::new("primary", Behavior::Wav { samples: 4000 }));
    let (service, cache, _) = service(primary.clone(), None).await;

    service.speak("Жаңы үн", "ky").await;
    let refreshed = service
        .refresh("Жаңы үн", "ky", podium_audio::VoiceConfig::default())
        .await;
    assert_eq!(refreshed.source, SpeechSource::Synthesized(Stage::Primary));
    assert_eq!(primary.calls(), 2);

    let again = service.speak("Жаңы үн", "ky").await;
    assert_eq!(again.source, SpeechSource::Cache);
    assert_eq!(again.audio, refreshed.audio);
    assert_eq!(primary.calls(), 2);
    assert_eq!(cache.stats().writes, 2);
}
