//! Project files on disk
//!
//! Each project is saved as `<projects_dir>/<project id>.cdtp`, holding the
//! byte stream produced by [`Project::serialize`].

use crate::error::ProjectError;
use crate::layer::LayerTypeRegistry;
use crate::project::{Project, ProjectServices};
use crate::types::ProjectId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PROJECT_FILE_EXTENSION: &str = "cdtp";

fn io_error(context: String, err: io::Error) -> ProjectError {
    ProjectError::ProjectFile(format!("{}: {}", context, err))
}

/// Save and load project files
pub struct ProjectFile;

impl ProjectFile {
    pub fn path_for(dir: &Path, project_id: ProjectId) -> PathBuf {
        dir.join(format!("{}.{}", project_id, PROJECT_FILE_EXTENSION))
    }

    /// Write the project file, replacing any previous version atomically
    pub fn save(dir: &Path, project: &Project) -> Result<PathBuf, ProjectError> {
        fs::create_dir_all(dir)
            .map_err(|e| io_error(format!("Failed to create projects directory {:?}", dir), e))?;

        let bytes = project.serialize()?;
        let path = Self::path_for(dir, project.id());
        let temp_path = path.with_extension("cdtp.tmp");

        fs::write(&temp_path, &bytes)
            .map_err(|e| io_error(format!("Failed to write project to {:?}", temp_path), e))?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            io_error(format!("Failed to rename temp file to {:?}", path), e)
        })?;

        debug!(project_id = %project.id(), path = %path.display(), bytes = bytes.len(), "Project saved");
        Ok(path)
    }

    pub fn load(
        path: &Path,
        registry: &LayerTypeRegistry,
        services: ProjectServices,
    ) -> Result<Project, ProjectError> {
        let bytes = fs::read(path)
            .map_err(|e| io_error(format!("Failed to read project from {:?}", path), e))?;
        Project::deserialize(&bytes, registry, services)
    }

    /// Load the project with `project_id` from `dir`
    pub fn load_id(
        dir: &Path,
        project_id: ProjectId,
        registry: &LayerTypeRegistry,
        services: ProjectServices,
    ) -> Result<Project, ProjectError> {
        Self::load(&Self::path_for(dir, project_id), registry, services)
    }

    /// Ids of the project files in `dir`, sorted
    pub fn list(dir: &Path) -> Result<Vec<ProjectId>, ProjectError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir)
            .map_err(|e| io_error(format!("Failed to list projects in {:?}", dir), e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| io_error(format!("Failed to list projects in {:?}", dir), e))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROJECT_FILE_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn remove(dir: &Path, project_id: ProjectId) -> Result<bool, ProjectError> {
        let path = Self::path_for(dir, project_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(format!("Failed to remove {:?}", path), e)),
        }
    }
}
