//! VLM-backed analyzers: ask a vision model about the front page.
//!
//! Both profiles share one implementation and differ only in phrasing and
//! default model. The page is encoded once per [`DocumentAnalyzer::analyze`]
//! and reused for every question; questions are spaced by the shared
//! [`Pacer`].

use super::{DocumentAnalyzer, RenderSettings};
use crate::config::{AnalyzerKind, ModelSelection};
use crate::error::CatalogError;
use crate::pipeline::encode::encode_front_page;
use crate::pipeline::llm::{self, CallSettings, Pacer, ProfileDefaults, AUTO, FALLBACK_MODEL};
use crate::pipeline::postprocess::clean_answer;
use crate::pipeline::render::FrontPage;
use crate::prompts::{self, VISION_SYSTEM_PROMPT};
use crate::snapshot::ModelSnapshot;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, ImageData, LLMProvider};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Questions and defaults of one VLM profile.
#[derive(Debug, Clone, Copy)]
pub struct VisionProfile {
    pub kind: AnalyzerKind,
    pub title_question: &'static str,
    pub publisher_question: &'static str,
    pub defaults: ProfileDefaults,
}

impl VisionProfile {
    pub fn doc_vqa() -> Self {
        Self {
            kind: AnalyzerKind::DocVqa,
            title_question: prompts::doc_vqa::TITLE,
            publisher_question: prompts::doc_vqa::PUBLISHER,
            defaults: ProfileDefaults {
                provider: None,
                model: FALLBACK_MODEL,
            },
        }
    }

    pub fn moondream() -> Self {
        Self {
            kind: AnalyzerKind::Moondream,
            title_question: prompts::moondream::TITLE,
            publisher_question: prompts::moondream::PUBLISHER,
            defaults: ProfileDefaults {
                provider: Some("ollama"),
                model: "moondream",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

struct LoadedModel {
    provider: Arc<dyn LLMProvider>,
    provider_name: String,
    model: String,
}

struct Analysis {
    page: FrontPage,
    image: ImageData,
}

pub struct VisionAnalyzer {
    profile: VisionProfile,
    selection: ModelSelection,
    settings: CallSettings,
    render: RenderSettings,
    pacer: Arc<Pacer>,
    loaded: Option<LoadedModel>,
    current: Option<Analysis>,
}

impl VisionAnalyzer {
    pub fn new(
        profile: VisionProfile,
        selection: ModelSelection,
        settings: CallSettings,
        render: RenderSettings,
        pacer: Arc<Pacer>,
    ) -> Self {
        Self {
            profile,
            selection,
            settings,
            render,
            pacer,
            loaded: None,
            current: None,
        }
    }

    pub fn profile(&self) -> &VisionProfile {
        &self.profile
    }

    async fn ask(&self, question: &str) -> Result<String, CatalogError> {
        let analysis = self.current.as_ref().ok_or(CatalogError::NotAnalyzed)?;
        let model = self
            .loaded
            .as_ref()
            .ok_or_else(|| CatalogError::ModelNotLoaded {
                name: self.extraction_name(),
            })?;

        let messages = vec![
            ChatMessage::system(VISION_SYSTEM_PROMPT),
            ChatMessage::user_with_images(question, vec![analysis.image.clone()]),
        ];

        self.pacer.wait().await;
        let label = format!(
            "{} [{}]",
            analysis
                .page
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            self.profile.name()
        );
        let raw = llm::ask(&model.provider, &messages, &self.settings, &label).await?;
        let answer = clean_answer(&raw);
        debug!("{}: {:?} → {:?}", label, question, answer);
        Ok(answer)
    }
}

#[async_trait]
impl DocumentAnalyzer for VisionAnalyzer {
    fn extraction_name(&self) -> String {
        match &self.loaded {
            Some(m) if m.model != AUTO => m.model.clone(),
            _ => self
                .selection
                .model
                .clone()
                .unwrap_or_else(|| self.profile.defaults.model.to_string()),
        }
    }

    async fn load(&mut self, snapshot: Option<&Path>) -> Result<(), CatalogError> {
        let mut selection = self.selection.clone();
        if let Some(path) = snapshot {
            let snap = ModelSnapshot::read(path, self.profile.name())?;
            info!(
                "Restoring {} snapshot: {}/{}",
                self.profile.name(),
                snap.provider,
                snap.model
            );
            if snap.provider != AUTO && selection.provider.is_none() {
                selection.provider_name = Some(snap.provider);
            }
            if snap.model != AUTO {
                selection.model = Some(snap.model);
            }
        }

        let (provider, provider_name, model) =
            llm::resolve_provider(&selection, self.profile.defaults)?;
        info!(
            "{} analyzer using {}/{}",
            self.profile.name(),
            provider_name,
            model
        );
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
        ModelSnapshot::new(self.profile.name(), &model.provider_name, &model.model).write(dest)
    }

    async fn analyze(&mut self, path: &Path) -> Result<(), CatalogError> {
        let page = self.render.render(path).await?;
        let image = encode_front_page(&page.image)?;
        self.current = Some(Analysis { page, image });
        Ok(())
    }

    fn front_page(&self) -> Option<&FrontPage> {
        self.current.as_ref().map(|a| &a.page)
    }

    async fn title(&self) -> Result<String, CatalogError> {
        self.ask(self.profile.title_question).await
    }

    async fn publisher(&self) -> Result<String, CatalogError> {
        self.ask(self.profile.publisher_question).await
    }
}
