//! Sled-backed metadata store

use crate::error::StorageError;
use crate::store::{ImageLayerRow, MetadataStore, ProjectRow};
use crate::types::{LayerId, ProjectId};
use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

const TREE_PROJECTS: &str = "project";
const TREE_IMAGE_LAYERS: &str = "imagelayer";

/// Sled-based implementation of [`MetadataStore`]
///
/// Image-layer rows are keyed by `project_id ‖ layer_id`, so all rows of one
/// project form a contiguous prefix range.
#[derive(Clone)]
pub struct SledMetadataStore {
    db: Db,
    projects: Tree,
    images: Tree,
}

impl SledMetadataStore {
    /// Open (or create) a store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::Backend(format!(
                "Failed to open metadata database at {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_db(db)
    }

    /// Temporary store removed when dropped
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let projects = db.open_tree(TREE_PROJECTS)?;
        let images = db.open_tree(TREE_IMAGE_LAYERS)?;
        Ok(Self {
            db,
            projects,
            images,
        })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn get_project(&self, project_id: ProjectId) -> Result<Option<ProjectRow>, StorageError> {
        match self.projects.get(project_id.as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn image_rows(&self, project_id: ProjectId) -> Result<Vec<ImageLayerRow>, StorageError> {
        self.images
            .scan_prefix(project_id.as_bytes())
            .map(|entry| -> Result<ImageLayerRow, StorageError> {
                let (_, raw) = entry?;
                Ok(bincode::deserialize(&raw)?)
            })
            .collect()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn image_key(project_id: ProjectId, layer_id: LayerId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(project_id.as_bytes());
    key[16..].copy_from_slice(layer_id.as_bytes());
    key
}

impl MetadataStore for SledMetadataStore {
    fn upsert(&self, project_id: ProjectId, name: &str) -> Result<(), StorageError> {
        let row = ProjectRow {
            id: project_id,
            name: name.to_string(),
        };
        self.projects
            .insert(project_id.as_bytes(), bincode::serialize(&row)?)?;
        debug!(project_id = %project_id, name, "Upserted project row");
        Ok(())
    }

    fn lookup_name(&self, project_id: ProjectId) -> Result<Option<String>, StorageError> {
        Ok(self.get_project(project_id)?.map(|row| row.name))
    }

    fn count_image_layers(&self, project_id: ProjectId) -> Result<usize, StorageError> {
        let mut count = 0;
        for entry in self.images.scan_prefix(project_id.as_bytes()) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn delete_project(&self, project_id: ProjectId) -> Result<(), StorageError> {
        let keys: Vec<sled::IVec> = self
            .images
            .scan_prefix(project_id.as_bytes())
            .keys()
            .collect::<Result<_, _>>()?;
        for key in keys {
            self.images.remove(key)?;
        }
        self.projects.remove(project_id.as_bytes())?;
        debug!(project_id = %project_id, "Deleted project rows");
        Ok(())
    }

    fn insert_image_layer(&self, row: &ImageLayerRow) -> Result<(), StorageError> {
        self.images.insert(
            image_key(row.project_id, row.id),
            bincode::serialize(row)?,
        )?;
        Ok(())
    }

    fn remove_image_layer(
        &self,
        project_id: ProjectId,
        layer_id: LayerId,
    ) -> Result<(), StorageError> {
        self.images.remove(image_key(project_id, layer_id))?;
        Ok(())
    }
}
