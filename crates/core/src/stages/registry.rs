//! Registry of stage adapters for one pipeline.
//!
//! The engine looks stages up by name here. Building the registry from a
//! pipeline goes through the [`StageFactory`]; tests register mocks
//! directly.

use crate::stages::base::Stage;
use crate::stages::factory::{StageFactory, Toolchain};
use anyhow::Result;
use sl_protocol::Pipeline;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One adapter per stage of `pipeline`.
    pub fn for_pipeline(pipeline: &Pipeline, toolchain: &Toolchain) -> Result<Self> {
        let mut registry = Self::new();
        for def in &pipeline.stages {
            registry.register(def.name.clone(), StageFactory::create(def, toolchain)?);
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, stage: Arc<dyn Stage>) {
        self.stages.insert(name.into(), stage);
    }

    pub fn with_stage(mut self, name: impl Into<String>, stage: impl Stage + 'static) -> Self {
        self.register(name, Arc::new(stage));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Registered stage names, sorted.
    pub fn list_stages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stages.keys().cloned().collect();
        names.sort();
        names
    }
}
