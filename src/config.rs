//! Configuration
//!
//! Layered configuration, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. global file: `$XDG_CONFIG_HOME/cdt/config.toml` (or `~/.config/cdt/config.toml`)
//! 3. workspace file: `<workspace>/config/config.toml`
//! 4. environment file: `<workspace>/config/{CDT_ENV}.toml`
//! 5. environment variables: `CDT__SECTION__KEY`, e.g. `CDT__JOBS__TIMEOUT_SECS=60`

use crate::logging::LoggingConfig;
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdtConfig {
    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where metadata and project files live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database holding project and image-layer rows
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// Directory of `<id>.cdtp` project files
    #[serde(default = "default_projects_path")]
    pub projects_path: PathBuf,

    /// Delete artifact files from disk when their layer is removed
    #[serde(default)]
    pub purge_artifacts: bool,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from(".cdt/metadata")
}

fn default_projects_path() -> PathBuf {
    PathBuf::from(".cdt/projects")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            projects_path: default_projects_path(),
            purge_artifacts: false,
        }
    }
}

impl StorageConfig {
    /// Metadata path, relative paths resolved against `workspace`
    pub fn metadata_dir(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.metadata_path)
    }

    /// Projects path, relative paths resolved against `workspace`
    pub fn projects_dir(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.projects_path)
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Detection job settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// How long a caller waits for a job before abandoning it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// External detector program
    #[serde(default)]
    pub detector_command: Option<String>,

    #[serde(default)]
    pub detector_args: Vec<String>,
}

fn default_timeout_secs() -> Option<u64> {
    Some(3600)
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            detector_command: None,
            detector_args: Vec::new(),
        }
    }
}

impl JobsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Storage(String),
    Jobs(String),
    Logging(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Jobs(msg) => write!(f, "Jobs: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CdtConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let storage = &self.system.storage;

        if storage.metadata_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("Metadata path cannot be empty".into()));
        }
        if storage.projects_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage("Projects path cannot be empty".into()));
        }
        if self.jobs.timeout_secs == Some(0) {
            errors.push(ValidationError::Jobs("Timeout must be at least one second".into()));
        }
        if matches!(&self.jobs.detector_command, Some(cmd) if cmd.trim().is_empty()) {
            errors.push(ValidationError::Jobs("Detector command cannot be blank".into()));
        }
        if !["json", "text"].contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "Invalid format '{}'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Builds a [`CdtConfig`] from its sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the full layered configuration for `workspace`
    pub fn load(workspace: &Path) -> Result<CdtConfig, ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace)?;
        builder
            .add_source(
                Environment::with_prefix("CDT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load defaults overlaid with a single explicit file
    pub fn load_from_file(path: &Path) -> Result<CdtConfig, ConfigError> {
        merge::merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
