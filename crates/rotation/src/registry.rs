//! Name → factory table for rotators.

use std::collections::HashMap;
use std::sync::Arc;

use dsops_core::{DsopsError, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::rotator::Rotator;
use crate::rotators::{RandomRotator, ScriptRotator, WebhookRotator};

/// Builds a fresh rotator per call
pub type RotatorFactory = Box<dyn Fn() -> Box<dyn Rotator> + Send + Sync>;

/// Registry of rotator factories.
///
/// Registration is O(1) behind a single mutex; lookups are read-heavy.
/// A name can be registered once; attempts to shadow an existing entry
/// (including the built-ins) are rejected.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Mutex<HashMap<String, Arc<RotatorFactory>>>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in rotators:
    /// `random`, `webhook`, `script`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut entries = registry.entries.lock();
            entries.insert(
                "random".to_string(),
                Arc::new(Box::new(|| Box::new(RandomRotator::new()) as Box<dyn Rotator>)),
            );
            entries.insert(
                "webhook".to_string(),
                Arc::new(Box::new(|| Box::new(WebhookRotator::new()) as Box<dyn Rotator>)),
            );
            entries.insert(
                "script".to_string(),
                Arc::new(Box::new(|| Box::new(ScriptRotator::new()) as Box<dyn Rotator>)),
            );
        }
        registry
    }

    /// Register a factory under a new name
    pub fn register(&self, name: impl Into<String>, factory: RotatorFactory) -> Result<()> {
        let name = name.into();
        let mut entries = self.entries.lock();
        if entries.contains_key(&name) {
            return Err(DsopsError::configuration(
                "strategy",
                name.clone(),
                format!("strategy `{name}` is already registered"),
            ));
        }
        debug!(strategy = %name, "registered rotator factory");
        entries.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Instantiate a fresh rotator by name
    pub fn create(&self, name: &str) -> Option<Box<dyn Rotator>> {
        let factory = self.entries.lock().get(name).cloned()?;
        debug!(strategy = %name, "instantiating rotator");
        Some(factory())
    }

    /// Whether a name is registered
    pub fn has(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
