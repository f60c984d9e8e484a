//! Layer type registry: type tag to change-layer factory.
//!
//! Built once, before any project is loaded, and passed explicitly to
//! deserialization. The mapping is a plain map keyed by tag, so lookup does
//! not depend on the order variants were registered in.

use crate::error::ProjectError;
use crate::layer::change::{ChangeLayer, ChangeVariant};
use crate::types::{LayerId, ProjectId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Constructs an empty change layer bound to a project
pub type ChangeLayerFactory = Arc<dyn Fn(ProjectId) -> ChangeLayer + Send + Sync>;

/// Registry of change-layer types available for reconstruction
#[derive(Clone, Default)]
pub struct LayerTypeRegistry {
    factories: HashMap<String, ChangeLayerFactory>,
}

impl LayerTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the four built-in variants
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for variant in ChangeVariant::builtin() {
            let registered = registry.register_variant(variant);
            debug_assert!(registered.is_ok(), "built-in change layer tags must be distinct");
        }
        registry
    }

    /// Register a factory under `tag`
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        factory: ChangeLayerFactory,
    ) -> Result<(), ProjectError> {
        let tag = tag.into();
        if self.factories.contains_key(&tag) {
            return Err(ProjectError::DuplicateLayerType(tag));
        }
        debug!(tag = %tag, "Registering change layer type");
        self.factories.insert(tag, factory);
        Ok(())
    }

    /// Register a variant with the default factory for it
    pub fn register_variant(&mut self, variant: ChangeVariant) -> Result<(), ProjectError> {
        let tag = variant.tag().to_string();
        self.register(
            tag,
            Arc::new(move |project_id| {
                ChangeLayer::new(LayerId::nil(), project_id, variant.clone())
            }),
        )
    }

    /// Construct an empty layer of the type registered under `tag`
    pub fn create(&self, tag: &str, project_id: ProjectId) -> Result<ChangeLayer, ProjectError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| ProjectError::UnknownLayerType(tag.to_string()))?;
        Ok(factory(project_id))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for LayerTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerTypeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
