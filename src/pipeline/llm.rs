//! Model calls: resolve a provider and ask it a question with retry.
//!
//! Prompt text lives in [`crate::prompts`]; this module only knows how to
//! reach a provider and how to survive its transient failures.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) gives 500 ms → 1 s → 2 s with the
//! default settings.

use crate::config::{CatalogConfig, ModelSelection};
use crate::error::CatalogError;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Model used when neither the caller nor the environment names one.
pub const FALLBACK_MODEL: &str = "gpt-4.1-nano";

/// Recorded provider and model name when the environment picked both.
pub const AUTO: &str = "auto";

/// Provider and model a profile falls back to before consulting the
/// environment.
#[derive(Debug, Clone, Copy)]
pub struct ProfileDefaults {
    pub provider: Option<&'static str>,
    pub model: &'static str,
}

/// Sampling and retry settings for one kind of call.
#[derive(Debug, Clone, Copy)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl CallSettings {
    /// Settings for front-page questions.
    pub fn for_answers(config: &CatalogConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_answer_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Settings for keyword generation.
    pub fn for_keywords(config: &CatalogConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_keyword_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Delay before retry `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1)))
    }
}

/// Spaces successive model calls by a fixed pause.
///
/// One pacer is shared by the analyzer and the keyword model of a pass, so
/// the pause holds across both.
#[derive(Debug)]
pub struct Pacer {
    pause: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(pause: Duration) -> Self {
        Self {
            pause,
            last_call: Mutex::new(None),
        }
    }

    /// Sleep until `pause` has passed since the previous call, then record
    /// this one.
    pub async fn wait(&self) {
        let remaining = {
            let last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
            last.map(|t| self.pause.saturating_sub(t.elapsed()))
        };
        if let Some(d) = remaining.filter(|d| !d.is_zero()) {
            sleep(d).await;
        }
        *self.last_call.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

/// Instantiate a named provider with the given model.
pub fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, CatalogError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CatalogError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve a provider, from most-specific to least-specific.
///
/// 1. A pre-built provider in the selection.
/// 2. A named provider in the selection, with its model or the profile model.
/// 3. The profile's own default provider (moondream runs on Ollama).
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 5. OpenAI when `OPENAI_API_KEY` is set.
/// 6. `ProviderFactory::from_env` auto-detection.
///
/// Returns the provider together with the `(provider, model)` names used,
/// which snapshots record.
pub fn resolve_provider(
    selection: &ModelSelection,
    defaults: ProfileDefaults,
) -> Result<(Arc<dyn LLMProvider>, String, String), CatalogError> {
    let model = selection
        .model
        .clone()
        .unwrap_or_else(|| defaults.model.to_string());

    if let Some(ref provider) = selection.provider {
        let name = selection
            .provider_name
            .clone()
            .unwrap_or_else(|| "custom".to_string());
        return Ok((Arc::clone(provider), name, model));
    }

    if let Some(ref name) = selection.provider_name {
        return Ok((create_provider(name, &model)?, name.clone(), model));
    }

    if let Some(name) = defaults.provider {
        return Ok((create_provider(name, &model)?, name.to_string(), model));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let chosen = selection.model.clone().unwrap_or(env_model);
            return Ok((create_provider(&prov, &chosen)?, prov, chosen));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((create_provider("openai", &model)?, "openai".to_string(), model));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| CatalogError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;
    Ok((llm_provider, AUTO.to_string(), AUTO.to_string()))
}

/// Send `messages` and return the answer text.
///
/// Retries every failure up to `settings.max_retries` times. `label` tags
/// log lines, typically the file name and the question.
pub async fn ask(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    settings: &CallSettings,
    label: &str,
) -> Result<String, CatalogError> {
    let start = Instant::now();
    let options = settings.options();
    let mut last_err: Option<String> = None;

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            let backoff = settings.backoff(attempt);
            warn!(
                "{}: retry {}/{} after {:?}",
                label, attempt, settings.max_retries, backoff
            );
            sleep(backoff).await;
        }

        match provider.chat(messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(response.content);
            }
            Err(e) => {
                let err_msg = format!("{e}");
                warn!("{}: attempt {} failed: {}", label, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(CatalogError::LlmApiError {
        retries: settings.max_retries,
        message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}
