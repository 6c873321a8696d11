//! Static reporter registry.
//!
//! Reporters are compiled in and instantiated through factory functions;
//! the contract would equally support dynamic loading, but in-process
//! factories keep discovery deterministic. An empty registry at startup is
//! fatal for the application.

use crate::buildwatch::BuildWatchReporter;
use crate::textfile::TextFileReporter;
use crate::Reporter;

pub type ReporterFactory = fn() -> Box<dyn Reporter>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no reporters are registered")]
    NoneLoaded,
    #[error("no reporter covers the \"{0}\" beat for this story")]
    NoReportersForBeat(String),
}

pub struct ReporterRegistry {
    factories: Vec<ReporterFactory>,
}

impl ReporterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Registry with every built-in reporter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(|| Box::new(TextFileReporter::new()));
        registry.register(|| Box::new(BuildWatchReporter::new()));
        registry
    }

    pub fn register(&mut self, factory: ReporterFactory) {
        self.factories.push(factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Fresh instances of every registered reporter (for dialog listings).
    pub fn instantiate_all(&self) -> Vec<Box<dyn Reporter>> {
        self.factories.iter().map(|f| f()).collect()
    }

    /// Instantiate a reporter by its stable plugin id.
    pub fn instantiate(&self, plugin_id: &str) -> Option<Box<dyn Reporter>> {
        self.factories
            .iter()
            .map(|f| f())
            .find(|r| r.plugin_id() == plugin_id)
    }

    /// Most confident reporter of the given class for a story, confidence
    /// zero excluded.
    pub fn best_for(
        &self,
        beat: &str,
        story: &str,
    ) -> Result<Box<dyn Reporter>, RegistryError> {
        if self.factories.is_empty() {
            return Err(RegistryError::NoneLoaded);
        }
        self.factories
            .iter()
            .map(|f| f())
            .filter(|r| r.plugin_class() == beat)
            .map(|r| (r.supports(story), r))
            .filter(|(confidence, _)| *confidence > 0.0)
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, r)| r)
            .ok_or_else(|| RegistryError::NoReportersForBeat(beat.to_string()))
    }
}

impl Default for ReporterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
