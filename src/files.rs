//! Generated artifact registry
//!
//! Maps the id of every generated artifact (difference rasters, result
//! shapefiles) to where it lives on disk, so an artifact can be located and
//! released together with the layer that owns it.

use crate::error::ProjectError;
use crate::types::FileId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extensions that travel with a `.shp` file
const SHAPEFILE_SIDECARS: &[&str] = &["shx", "dbf", "prj", "cpg", "sbn", "sbx", "qix"];

const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff", "img", "vrt", "jp2", "png", "jpg", "jpeg"];

/// Kind of artifact, classified from its primary path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Raster,
    Shapefile,
    Other,
}

impl FileKind {
    pub fn classify(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("shp") => FileKind::Shapefile,
            Some(e) if RASTER_EXTENSIONS.contains(&e) => FileKind::Raster,
            _ => FileKind::Other,
        }
    }
}

/// Sidecar files that exist next to a shapefile
///
/// Returns an empty list when `path` is not a `.shp` file.
pub fn shapefile_affiliated(path: &Path) -> Vec<PathBuf> {
    if FileKind::classify(path) != FileKind::Shapefile {
        return Vec::new();
    }
    SHAPEFILE_SIDECARS
        .iter()
        .map(|ext| path.with_extension(ext))
        .filter(|sidecar| sidecar.exists())
        .collect()
}

/// Location of one registered artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub primary_path: PathBuf,
    pub auxiliary_paths: Vec<PathBuf>,
    pub kind: FileKind,
}

impl FileEntry {
    /// Delete the artifact and its auxiliary files from disk.
    ///
    /// Best effort: missing files are skipped and failures are logged.
    /// Returns the number of files actually removed.
    pub fn purge(&self) -> usize {
        let mut removed = 0;
        for path in std::iter::once(&self.primary_path).chain(self.auxiliary_paths.iter()) {
            if !path.exists() {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to purge artifact"),
            }
        }
        removed
    }
}

/// Registry of generated artifacts owned by one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    entries: BTreeMap<FileId, FileEntry>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `file_id`
    pub fn register(
        &mut self,
        file_id: FileId,
        primary_path: impl Into<PathBuf>,
        auxiliary_paths: Vec<PathBuf>,
        kind: FileKind,
    ) {
        let primary_path = primary_path.into();
        debug!(file_id = %file_id, path = %primary_path.display(), ?kind, "Registering artifact");
        self.entries.insert(
            file_id,
            FileEntry {
                primary_path,
                auxiliary_paths,
                kind,
            },
        );
    }

    /// Register a path, classifying it and collecting shapefile sidecars
    pub fn register_path(&mut self, file_id: FileId, primary_path: impl Into<PathBuf>) {
        let primary_path = primary_path.into();
        let kind = FileKind::classify(&primary_path);
        let auxiliary = shapefile_affiliated(&primary_path);
        self.register(file_id, primary_path, auxiliary, kind);
    }

    /// Remove an entry; unknown ids are ignored
    pub fn remove(&mut self, file_id: &FileId) -> Option<FileEntry> {
        self.entries.remove(file_id)
    }

    pub fn get(&self, file_id: &FileId) -> Option<&FileEntry> {
        self.entries.get(file_id)
    }

    pub fn contains(&self, file_id: &FileId) -> bool {
        self.entries.contains_key(file_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &FileId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileId, &FileEntry)> {
        self.entries.iter()
    }

    /// Encode as the opaque block embedded in a project stream
    pub fn to_block(&self) -> Result<Vec<u8>, ProjectError> {
        Ok(bincode::serialize(&self.entries)?)
    }

    pub fn from_block(block: &[u8]) -> Result<Self, ProjectError> {
        let entries: BTreeMap<FileId, FileEntry> = bincode::deserialize(block)?;
        Ok(Self { entries })
    }
}
