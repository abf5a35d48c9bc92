use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::traits::{ModelResolver, ModelStore};

/// Name → storage handle lookup table, filled at startup.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn ModelStore>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, store: Arc<dyn ModelStore>) -> &mut Self {
        self.models.insert(name.into(), store);
        self
    }

    pub fn with_model(mut self, name: impl Into<String>, store: Arc<dyn ModelStore>) -> Self {
        self.register(name, store);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|name| name.as_str())
    }
}

impl ModelResolver for ModelRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<dyn ModelStore>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Model '{}' does not exist", name))
    }
}
