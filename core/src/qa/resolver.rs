use super::prompt::{build_prompts, PromptLanguage};
use super::{Answer, AnswerSource, CachedAnswer, OverrideTable, QaConfig, Question};
use crate::cache::ResultCache;
use crate::coordinator::RequestCoordinator;
use crate::key::ContentKey;
use crate::llm::{ChatCompletion, ChatRequest};
use crate::{normalize_language, PodiumError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Answers questions about slides.
///
/// Never fails: every path ends in an [`Answer`], with failures carried as a
/// localized apology. Only provider answers are cached.
pub struct AnswerResolver {
    overrides: OverrideTable,
    cache: Arc<ResultCache>,
    chat: Option<Arc<dyn ChatCompletion>>,
    flights: RequestCoordinator<Answer>,
    cfg: QaConfig,
}

impl AnswerResolver {
    /// Resolver with the built-in override table and config from the environment.
    /// `chat = None` puts the resolver in offline mode.
    pub fn new(cache: Arc<ResultCache>, chat: Option<Arc<dyn ChatCompletion>>) -> Self {
        Self {
            overrides: OverrideTable::builtin(),
            cache,
            chat,
            flights: RequestCoordinator::new(),
            cfg: QaConfig::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideTable) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_config(mut self, cfg: QaConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn config(&self) -> &QaConfig {
        &self.cfg
    }

    pub fn is_offline(&self) -> bool {
        self.chat.is_none()
    }

    pub async fn resolve(&self, question: &Question) -> Answer {
        let language = normalize_language(&question.language);
        let lang = PromptLanguage::from_code(&language);

        if let Some((rule, text)) = self.overrides.lookup(&question.question, &language) {
            info!(target = "qa", rule = %rule, language = %language, "Answered from override table");
            return Answer {
                text: text.to_string(),
                source: AnswerSource::Override,
            };
        }

        let key = ContentKey::qa(&language, question.slide_id, question.question.trim());
        let question = Question {
            language,
            ..question.clone()
        };
        let cache = Arc::clone(&self.cache);
        let chat = self.chat.clone();
        let cfg = self.cfg.clone();
        let flight_key = key.clone();

        let outcome = self
            .flights
            .run(key, move || async move {
                answer_uncached(flight_key, question, cache, chat, cfg).await
            })
            .await;

        match outcome {
            Ok(answer) => answer,
            Err(e) => {
                error!(target = "qa", error = %e, "Answer computation aborted");
                Answer {
                    text: lang.apology(&e.summary()),
                    source: AnswerSource::Failure,
                }
            }
        }
    }

    /// Drop cached answers, for all languages or just one.
    pub async fn invalidate_answers(&self, language: Option<&str>) -> usize {
        let pattern = match language {
            Some(lang) => format!("qa:{}:*", normalize_language(lang)),
            None => "qa:*".to_string(),
        };
        self.cache.invalidate(&pattern).await
    }
}

async fn answer_uncached(
    key: ContentKey,
    question: Question,
    cache: Arc<ResultCache>,
    chat: Option<Arc<dyn ChatCompletion>>,
    cfg: QaConfig,
) -> Answer {
    let lang = PromptLanguage::from_code(&question.language);

    if let Some(hit) = cache.get_json::<CachedAnswer>(&key).await {
        debug!(target = "qa", key = %key, "Answer cache hit");
        return Answer {
            text: hit.answer,
            source: AnswerSource::Cache,
        };
    }

    let Some(chat) = chat else {
        warn!(target = "qa", "No chat provider configured; returning offline answer");
        return Answer {
            text: lang.offline_answer(&question.question),
            source: AnswerSource::Offline,
        };
    };

    let (system_prompt, user_prompt) = build_prompts(&question, cfg.allow_general);
    let request = ChatRequest {
        system_prompt,
        user_prompt,
        model: cfg.model.clone(),
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
    };

    let result = match tokio::time::timeout(cfg.timeout, chat.complete(&request)).await {
        Ok(Ok(text)) if text.trim().is_empty() => Err(PodiumError::ProviderFailure(
            "provider returned an empty answer".into(),
        )),
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(PodiumError::Timeout(cfg.timeout.as_millis() as u64)),
    };

    match result {
        Ok(text) => {
            let entry = CachedAnswer {
                question: question.question.clone(),
                answer: text.clone(),
                slide_id: question.slide_id,
                language: question.language.clone(),
            };
            cache.set_json(&key, &entry, cfg.ttl).await;
            info!(
                target = "qa",
                slide_id = question.slide_id,
                language = %question.language,
                chars = text.chars().count(),
                "Answered by provider"
            );
            Answer {
                text,
                source: AnswerSource::Provider,
            }
        }
        Err(e) => {
            error!(target = "qa", kind = e.kind(), error = %e, "Provider call failed");
            Answer {
                text: lang.apology(&e.summary()),
                source: AnswerSource::Failure,
            }
        }
    }
}
