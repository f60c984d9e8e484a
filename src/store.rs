//! Project Metadata Store
//!
//! Relational-style rows describing open projects and their image layers.
//! Every call is keyed by the project's identifier.

pub mod persistence;

pub use persistence::SledMetadataStore;

use crate::error::StorageError;
use crate::types::{LayerId, ProjectId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Project row: `(id, name)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: ProjectId,
    pub name: String,
}

/// Image-layer row keyed by `(id, project_id)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLayerRow {
    pub id: LayerId,
    pub project_id: ProjectId,
    pub name: String,
    pub path: PathBuf,
}

/// Metadata store interface
pub trait MetadataStore: Send + Sync {
    /// Insert the project row or update its name
    fn upsert(&self, project_id: ProjectId, name: &str) -> Result<(), StorageError>;

    fn lookup_name(&self, project_id: ProjectId) -> Result<Option<String>, StorageError>;

    fn count_image_layers(&self, project_id: ProjectId) -> Result<usize, StorageError>;

    /// Delete the project row and every image-layer row belonging to it
    fn delete_project(&self, project_id: ProjectId) -> Result<(), StorageError>;

    fn insert_image_layer(&self, row: &ImageLayerRow) -> Result<(), StorageError>;

    fn remove_image_layer(
        &self,
        project_id: ProjectId,
        layer_id: LayerId,
    ) -> Result<(), StorageError>;
}

/// In-process store used by tests and embedders without a database
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    projects: RwLock<HashMap<ProjectId, String>>,
    images: RwLock<BTreeMap<(ProjectId, LayerId), ImageLayerRow>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image_rows(&self, project_id: ProjectId) -> Vec<ImageLayerRow> {
        self.images
            .read()
            .values()
            .filter(|row| row.project_id == project_id)
            .cloned()
            .collect()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn upsert(&self, project_id: ProjectId, name: &str) -> Result<(), StorageError> {
        self.projects.write().insert(project_id, name.to_string());
        Ok(())
    }

    fn lookup_name(&self, project_id: ProjectId) -> Result<Option<String>, StorageError> {
        Ok(self.projects.read().get(&project_id).cloned())
    }

    fn count_image_layers(&self, project_id: ProjectId) -> Result<usize, StorageError> {
        Ok(self
            .images
            .read()
            .keys()
            .filter(|(owner, _)| *owner == project_id)
            .count())
    }

    fn delete_project(&self, project_id: ProjectId) -> Result<(), StorageError> {
        self.projects.write().remove(&project_id);
        self.images
            .write()
            .retain(|(owner, _), _| *owner != project_id);
        Ok(())
    }

    fn insert_image_layer(&self, row: &ImageLayerRow) -> Result<(), StorageError> {
        self.images
            .write()
            .insert((row.project_id, row.id), row.clone());
        Ok(())
    }

    fn remove_image_layer(
        &self,
        project_id: ProjectId,
        layer_id: LayerId,
    ) -> Result<(), StorageError> {
        self.images.write().remove(&(project_id, layer_id));
        Ok(())
    }
}
