// Ingestion pipeline: vector-text gate -> rasterize -> select -> fallback -> optional HTR pass
use image::DynamicImage;
use log::{info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::adapter::EngineConfig;
use super::combiner::combine_passes;
use super::executor::{execute_with_fallback, CandidateOrder, Execution};
use super::outcome::IngestOutcome;
use super::registry::AdapterRegistry;
use super::runner::{run_engine, Budget, EngineInput};
use super::selector::{auto_select_engine, PilotSettings};
use crate::config::{validate_threshold, IngestConfig};
use crate::pdf_extraction::{
    PdfTextExtractor, PdftoppmRasterizer, RasterRequest, Rasterizer, VectorTextExtractor,
    VectorTextGate,
};
use crate::types::{IngestError, Result};

/// Which engine leads the candidate order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EngineSelection {
    #[default]
    Auto,
    Named(String),
}

impl FromStr for EngineSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl From<&str> for EngineSelection {
    fn from(name: &str) -> Self {
        if name.eq_ignore_ascii_case("auto") {
            EngineSelection::Auto
        } else {
            EngineSelection::Named(name.to_lowercase())
        }
    }
}

/// Options for `ingest_document`. Unset values come from `IngestConfig`.
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    pub engine: EngineSelection,
    pub prefer_ocr: bool,
    pub dpi: Option<u32>,
    pub first_page: Option<u32>,
    pub last_page: Option<u32>,
    pub confidence_threshold: Option<f32>,
    pub fallback_order: Option<Vec<String>>,
    pub pilot_candidates: Option<Vec<String>>,
    pub engine_config: EngineConfig,
}

/// Options for `ingest_images`
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub engine: EngineSelection,
    pub confidence_threshold: Option<f32>,
    pub fallback_order: Option<Vec<String>>,
    pub pilot_candidates: Option<Vec<String>>,
    pub engine_config: EngineConfig,
}

/// Options for `ingest_with_handwriting`
#[derive(Debug, Clone)]
pub struct HandwritingOptions {
    pub enable_htr: bool,
    pub printed_engine: String,
    pub htr_engine: String,
    pub confidence_threshold: Option<f32>,
    pub fallback_order: Option<Vec<String>>,
    pub engine_config: EngineConfig,
}

impl Default for HandwritingOptions {
    fn default() -> Self {
        Self {
            enable_htr: false,
            printed_engine: "paddle".to_string(),
            htr_engine: "trocr".to_string(),
            confidence_threshold: None,
            fallback_order: None,
            engine_config: EngineConfig::new(),
        }
    }
}

// Resolved per-invocation settings shared by the document and image paths
struct RunPlan {
    engine: EngineSelection,
    threshold: f32,
    fallback_order: Option<Vec<String>>,
    pilot_candidates: Vec<String>,
    engine_config: Arc<EngineConfig>,
}

pub struct IngestPipeline {
    config: IngestConfig,
    registry: Arc<AdapterRegistry>,
    extractor: Arc<dyn VectorTextExtractor>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl IngestPipeline {
    /// Pipeline with the bundled engines, pdftotext and pdftoppm
    pub fn new(config: IngestConfig) -> Self {
        let registry = AdapterRegistry::with_default_engines(config.models_dir.clone());
        Self {
            config,
            registry: Arc::new(registry),
            extractor: Arc::new(PdfTextExtractor::new()),
            rasterizer: Arc::new(PdftoppmRasterizer::new()),
        }
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_extractor(mut self, extractor: impl VectorTextExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizer = Arc::new(rasterizer);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Embedded text when sufficient, otherwise recognition over the
    /// rasterized pages.
    pub async fn ingest_document(&self, path: &Path, options: DocumentOptions) -> Result<IngestOutcome> {
        let budget = Budget::new(self.config.timeout());
        let plan = self.plan(
            options.engine,
            options.confidence_threshold,
            options.fallback_order,
            options.pilot_candidates,
            &options.engine_config,
        )?;

        let gate = VectorTextGate::new(self.config.min_vector_text_len);
        let extractor = self.extractor.clone();
        let doc_path = path.to_path_buf();
        let prefer_ocr = options.prefer_ocr;
        let vector_text = tokio::task::spawn_blocking(move || {
            gate.check(extractor.as_ref(), &doc_path, prefer_ocr)
        })
        .await
        .unwrap_or(None);
        if let Some(text) = vector_text {
            return Ok(IngestOutcome::from_vector_text(path.to_path_buf(), text));
        }

        let request = RasterRequest {
            dpi: options.dpi.unwrap_or(self.config.dpi),
            first_page: options.first_page,
            last_page: options.last_page,
        };
        let rasterizer = self.rasterizer.clone();
        let doc_path = path.to_path_buf();
        let images = tokio::task::spawn_blocking(move || rasterizer.rasterize(&doc_path, &request))
            .await
            .map_err(|e| IngestError::RasterizationFailed(format!("rasterizer task aborted: {e}")))??;
        info!("rasterized {} pages from {}", images.len(), path.display());

        let page_count = images.len();
        let input = EngineInput::document(path.to_path_buf(), Arc::new(images));
        let mut outcome = self.recognize(input, plan, &budget).await?;
        outcome.input_path = Some(path.to_path_buf());
        outcome
            .metadata
            .entry("rasterized_pages".to_string())
            .or_insert(Value::from(page_count));
        Ok(outcome)
    }

    /// Recognition over an in-memory batch of page images
    pub async fn ingest_images(&self, images: Vec<DynamicImage>, options: ImageOptions) -> Result<IngestOutcome> {
        let budget = Budget::new(self.config.timeout());
        let plan = self.plan(
            options.engine,
            options.confidence_threshold,
            options.fallback_order,
            options.pilot_candidates,
            &options.engine_config,
        )?;
        self.recognize(EngineInput::images(Arc::new(images)), plan, &budget)
            .await
    }

    /// Printed-text recognition, optionally followed by a handwriting pass.
    /// A failing handwriting pass leaves the printed result untouched.
    pub async fn ingest_with_handwriting(
        &self,
        images: Vec<DynamicImage>,
        options: HandwritingOptions,
    ) -> Result<IngestOutcome> {
        let budget = Budget::new(self.config.timeout());
        let plan = self.plan(
            EngineSelection::from(options.printed_engine.as_str()),
            options.confidence_threshold,
            options.fallback_order,
            None,
            &options.engine_config,
        )?;
        let engine_config = plan.engine_config.clone();
        let images = Arc::new(images);
        let printed = self
            .recognize(EngineInput::images(images.clone()), plan, &budget)
            .await?;
        if !options.enable_htr {
            return Ok(printed);
        }

        let htr = run_engine(
            self.registry.clone(),
            &options.htr_engine.to_lowercase(),
            EngineInput::images(images),
            engine_config,
            &budget,
        )
        .await;
        match htr {
            Ok(htr) if htr.text().trim().is_empty() => {
                warn!("handwriting pass with {} returned no text", options.htr_engine);
                Ok(printed)
            }
            Ok(htr) => Ok(combine_passes(printed, htr)),
            Err(e) => {
                warn!("handwriting pass with {} failed: {}", options.htr_engine, e);
                Ok(printed)
            }
        }
    }

    fn plan(
        &self,
        engine: EngineSelection,
        threshold: Option<f32>,
        fallback_order: Option<Vec<String>>,
        pilot_candidates: Option<Vec<String>>,
        engine_config: &EngineConfig,
    ) -> Result<RunPlan> {
        let threshold = threshold.unwrap_or(self.config.confidence_threshold);
        validate_threshold(threshold)?;

        let pilot_candidates = pilot_candidates.unwrap_or_else(|| self.config.pilot_candidates.clone());
        if pilot_candidates.is_empty() {
            return Err(IngestError::InvalidConfig("no pilot candidates".to_string()));
        }

        if let EngineSelection::Named(name) = &engine {
            self.registry.ensure_known(std::iter::once(name))?;
        }
        if let Some(order) = &fallback_order {
            self.registry.ensure_known(order)?;
        }
        if matches!(engine, EngineSelection::Auto) {
            self.registry.ensure_known(&pilot_candidates)?;
        }
        if self.config.append_default_fallbacks {
            self.registry.ensure_known(&self.config.default_fallbacks)?;
        }

        let engine_config = engine_config.prepared(self.config.language.as_deref(), self.config.use_gpu);
        Ok(RunPlan {
            engine,
            threshold,
            fallback_order,
            pilot_candidates,
            engine_config: Arc::new(engine_config),
        })
    }

    async fn recognize(&self, input: EngineInput, plan: RunPlan, budget: &Budget) -> Result<IngestOutcome> {
        let primary = match plan.engine {
            EngineSelection::Named(name) => name,
            EngineSelection::Auto => {
                let settings = PilotSettings::from_config(&self.config);
                auto_select_engine(
                    &self.registry,
                    &input.images,
                    &plan.pilot_candidates,
                    &settings,
                    &plan.engine_config,
                    budget,
                )
                .await?
            }
        };

        let order = CandidateOrder::build(
            &primary,
            plan.fallback_order.as_deref(),
            &self.config.default_fallbacks,
            self.config.append_default_fallbacks,
        );
        info!("engine order: {}", order.as_slice().join(", "));

        let execution = execute_with_fallback(
            &self.registry,
            &order,
            &input,
            &plan.engine_config,
            plan.threshold,
            budget,
        )
        .await?;
        Ok(into_ingest_outcome(input.pdf_path, execution))
    }
}

fn into_ingest_outcome(input_path: Option<PathBuf>, execution: Execution) -> IngestOutcome {
    let Execution {
        outcome,
        attempts,
        accepted,
        timed_out,
    } = execution;
    let mut result = IngestOutcome::from_recognition(input_path, outcome, attempts);
    if !accepted {
        result.metadata.insert("below_threshold".to_string(), Value::Bool(true));
    }
    if timed_out {
        result.metadata.insert("timed_out".to_string(), Value::Bool(true));
    }
    result
}
