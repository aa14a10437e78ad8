//! Two-step keyword generation with a text model.
//!
//! Step one asks which sciences a title belongs to; step two asks the model
//! to boil its own description down to a comma-separated list. Asking
//! directly for a list gives noticeably worse topics with small models.

use super::KeywordInference;
use crate::config::ModelSelection;
use crate::error::CatalogError;
use crate::pipeline::llm::{self, CallSettings, Pacer, ProfileDefaults, AUTO, FALLBACK_MODEL};
use crate::prompts::{keyword_extract_prompt, keyword_topics_prompt};
use crate::snapshot::ModelSnapshot;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Snapshot profile name.
pub const PROFILE: &str = "keywords";

const DEFAULTS: ProfileDefaults = ProfileDefaults {
    provider: None,
    model: FALLBACK_MODEL,
};

struct LoadedModel {
    provider: Arc<dyn LLMProvider>,
    provider_name: String,
    model: String,
}

pub struct TextGenerationKeywords {
    selection: ModelSelection,
    settings: CallSettings,
    pacer: Arc<Pacer>,
    loaded: Option<LoadedModel>,
}

impl TextGenerationKeywords {
    pub fn new(selection: ModelSelection, settings: CallSettings, pacer: Arc<Pacer>) -> Self {
        Self {
            selection,
            settings,
            pacer,
            loaded: None,
        }
    }

    async fn chat(&self, model: &LoadedModel, prompt: String) -> Result<String, CatalogError> {
        self.pacer.wait().await;
        let messages = vec![ChatMessage::user(prompt)];
        llm::ask(&model.provider, &messages, &self.settings, PROFILE).await
    }
}

#[async_trait]
impl KeywordInference for TextGenerationKeywords {
    fn extraction_name(&self) -> String {
        match &self.loaded {
            Some(m) if m.model != AUTO => m.model.clone(),
            _ => self
                .selection
                .model
                .clone()
                .unwrap_or_else(|| DEFAULTS.model.to_string()),
        }
    }

    async fn load(&mut self, snapshot: Option<&Path>) -> Result<(), CatalogError> {
        let mut selection = self.selection.clone();
        if let Some(path) = snapshot {
            let snap = ModelSnapshot::read(path, PROFILE)?;
            if snap.provider != AUTO && selection.provider.is_none() {
                selection.provider_name = Some(snap.provider);
            }
            if snap.model != AUTO {
                selection.model = Some(snap.model);
            }
        }
        let (provider, provider_name, model) = llm::resolve_provider(&selection, DEFAULTS)?;
        info!("Keyword model: {}/{}", provider_name, model);
        self.loaded = Some(LoadedModel {
            provider,
            provider_name,
            model,
        });
        Ok(())
    }

    async fn save(&self, dest: &Path) -> Result<(), CatalogError> {
        let model = self
            .loaded
            .as_ref()
            .ok_or_else(|| CatalogError::ModelNotLoaded {
                name: self.extraction_name(),
            })?;
        ModelSnapshot::new(PROFILE, &model.provider_name, &model.model).write(dest)
    }

    async fn keywords(&self, title: &str) -> Result<String, CatalogError> {
        let model = self
            .loaded
            .as_ref()
            .ok_or_else(|| CatalogError::ModelNotLoaded {
                name: self.extraction_name(),
            })?;
        let description = self.chat(model, keyword_topics_prompt(title)).await?;
        let answer = self.chat(model, keyword_extract_prompt(&description)).await?;
        debug!("Keywords for {:?}: {:?}", title, answer);
        Ok(answer)
    }
}
