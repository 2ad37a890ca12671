// Engine registry - maps engine identifiers to adapter constructors
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::adapter::RecognizerAdapter;
use crate::engines;
use crate::types::{IngestError, Result};

pub type AdapterFactory = Arc<dyn Fn() -> Result<Box<dyn RecognizerAdapter>> + Send + Sync>;

/// Single source of truth for which engines exist.
///
/// No caching: every `build` constructs a fresh adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: IndexMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the seven bundled engines. Model-backed engines look up
    /// their files under `models_dir`.
    pub fn with_default_engines(models_dir: impl Into<PathBuf>) -> Self {
        let models_dir = models_dir.into();
        let mut registry = Self::new();

        let dir = models_dir.clone();
        registry.register("paddle", move || engines::paddle::create(&dir));
        registry.register("tesseract", engines::tesseract::create);
        registry.register("easyocr", engines::easyocr::create);
        registry.register("doctr", engines::doctr::create);
        let dir = models_dir.clone();
        registry.register("trocr", move || engines::trocr::create(&dir));
        let dir = models_dir;
        registry.register("donut", move || engines::donut::create(&dir));
        registry.register("nougat", engines::nougat::create);

        registry
    }

    /// Adds or replaces an engine. Identifiers are matched case-insensitively.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn RecognizerAdapter>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Fails with `UnknownEngine` for the first name not in the registry.
    pub fn ensure_known<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for name in names {
            if !self.contains(name) {
                return Err(IngestError::UnknownEngine(name.clone()));
            }
        }
        Ok(())
    }

    pub fn build(&self, name: &str) -> Result<Box<dyn RecognizerAdapter>> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| IngestError::UnknownEngine(name.to_string()))?;
        factory()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("engines", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
