mod config;

use clap::Parser;
use config::{CacheBackend, PregenAppConfig};
use podium_audio::{
    BatchPregenerator, Deck, FallbackConfig, FallbackSynthesizer, FsArtifactStore, PregenAction,
    PregenConfig, SpeechService,
};
use podium_core::{CacheStore, MemoryStore, ResultCache};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pregen", version, about = "Pre-generate narration audio for a slide deck")]
struct Cli {
    /// Deck JSON: {"slides":[{"id":1,"title":"…","content":"…","tts":"…"}]}
    deck: PathBuf,

    /// Regenerate slides even when a real artifact already exists.
    #[arg(short, long)]
    force: bool,

    /// Narration language (ky, ru, en).
    #[arg(short, long)]
    language: Option<String>,

    /// Deck directory name under the audio root.
    #[arg(long)]
    deck_name: Option<String>,

    /// Audio root directory.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Path to a custom `pregen.toml`.
    #[arg(long)]
    config: Option<String>,

    /// Write the per-slide manifest as JSON.
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    podium_core::telemetry::init_logging("info,podium_core=info,podium_audio=info,pregen=info")?;
    let cli = Cli::parse();

    let mut cfg = PregenAppConfig::load(cli.config.as_deref());
    if let Some(lang) = cli.language {
        cfg.language = lang;
    }
    if let Some(name) = cli.deck_name {
        cfg.deck_name = name;
    }
    if let Some(out) = cli.out {
        cfg.audio_root = out;
    }

    let deck = Deck::load(&cli.deck).await?;
    info!(target = "pregen", deck = %cli.deck.display(), slides = deck.slides.len(), "Loaded deck");

    let cache = Arc::new(ResultCache::connect(open_store(&cfg)).await);
    let _sweeper = cfg
        .cache
        .sweep_interval_secs
        .and_then(|secs| cache.spawn_sweeper(Duration::from_secs(secs)));

    let mut fallback_cfg = FallbackConfig::default();
    if let Some(ms) = cfg.stage_timeout_ms {
        fallback_cfg.stage_timeout = Duration::from_millis(ms);
    }
    let synth = FallbackSynthesizer::from_env().with_config(fallback_cfg);
    info!(target = "pregen", stages = ?synth.stages(), "Synthesis chain ready");

    let speech = Arc::new(SpeechService::new(Arc::clone(&cache), Arc::new(synth)));
    let pregen = BatchPregenerator::new(speech, FsArtifactStore::new(cfg.audio_root.clone()));

    let mut run = PregenConfig::new(cfg.language.clone(), cfg.deck_name.clone())
        .force(cli.force)
        .with_voice(cfg.voice.clone());
    run.placeholder_threshold = cfg.placeholder_threshold;

    let report = pregen.run(&deck.slides, &run).await;

    for e in &report.entries {
        let status = match &e.action {
            PregenAction::Skipped => "skip (exists)".to_string(),
            PregenAction::Generated { from_cache: true } => "ok (cache)".to_string(),
            PregenAction::Generated { from_cache: false } => "ok".to_string(),
            PregenAction::Placeholder { reason } => format!("silence ({reason})"),
            PregenAction::NoText => "skip (no text)".to_string(),
            PregenAction::Failed { error } => format!("FAILED ({error})"),
        };
        println!("{:>4}  {:<16} {}", e.slide_id, e.expected_filename, status);
    }
    println!(
        "generated={} skipped={} placeholders={} failed={} cache={:?}",
        report.generated(),
        report.skipped(),
        report.placeholders(),
        report.failed(),
        cache.stats()
    );

    if let Some(path) = cli.manifest {
        tokio::fs::write(&path, serde_json::to_vec_pretty(&report)?).await?;
        info!(target = "pregen", path = %path.display(), "Wrote manifest");
    }
    Ok(())
}

fn open_store(cfg: &PregenAppConfig) -> Arc<dyn CacheStore> {
    match cfg.cache.backend {
        CacheBackend::Memory => MemoryStore::new(),
        #[cfg(feature = "persistent")]
        CacheBackend::Rocksdb => match podium_core::cache::RocksDbCacheStore::open(&cfg.cache.path) {
            Ok(store) => store as Arc<dyn CacheStore>,
            Err(e) => {
                warn!(target = "pregen", error = %e, "RocksDB cache unavailable; using memory");
                MemoryStore::new()
            }
        },
        #[cfg(not(feature = "persistent"))]
        CacheBackend::Rocksdb => {
            warn!(target = "pregen", "Built without `persistent`; using memory cache");
            MemoryStore::new()
        }
    }
}
