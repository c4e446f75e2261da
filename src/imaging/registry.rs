//! Name → engine lookup used by the thumbnail pipeline.

use super::backend::ImageBackend;
use super::rust_backend::RustBackend;
use super::sips_backend::SipsBackend;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Engines addressable from the `engine` key of a thumbnail spec.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: BTreeMap<String, Arc<dyn ImageBackend>>,
}

impl EngineRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `pil` (the `image` crate engine) and `sips`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("pil", Arc::new(RustBackend::new()));
        registry.register("sips", Arc::new(SipsBackend::new()));
        registry
    }

    /// Add or replace the engine registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, engine: Arc<dyn ImageBackend>) {
        self.engines.insert(name.into(), engine);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageBackend>> {
        self.engines.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}
