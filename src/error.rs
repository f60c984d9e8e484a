//! Error types for the project layer subsystem.

use crate::types::{JobId, LayerId};
use std::time::Duration;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Failed to encode or decode stored record: {0}")]
    Codec(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Codec(err.to_string())
    }
}

/// Errors raised by project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Change detection needs at least {required} images, but the project has {image_count} (fewer than {required} images)")]
    Precondition { image_count: usize, required: usize },

    #[error("Invalid identifier: {0} is null")]
    InvalidIdentifier(&'static str),

    #[error("Unknown change layer type '{0}': no factory is registered for this tag")]
    UnknownLayerType(String),

    #[error("Change layer type '{0}' is already registered")]
    DuplicateLayerType(String),

    #[error("Layer {0} already exists in this project")]
    DuplicateLayer(LayerId),

    #[error("Image layer {0} does not belong to this project")]
    UnknownImage(LayerId),

    #[error("Metadata store error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Project file error: {0}")]
    ProjectFile(String),

    #[error("Malformed project stream: {0}")]
    Codec(String),

    #[error("Detection result is missing '{0}'")]
    MalformedJobResult(String),

    #[error("Detection job {job} did not complete within {after:?}")]
    JobTimeout { job: JobId, after: Duration },

    #[error("Detection job {job} failed: {reason}")]
    JobFailed { job: JobId, reason: String },

    #[error("Detection job {0} is not pending for this project")]
    StaleJob(JobId),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProjectError {
    /// Errors after which the rest of a project stream cannot be framed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProjectError::UnknownLayerType(_) | ProjectError::Codec(_)
        )
    }
}

impl From<bincode::Error> for ProjectError {
    fn from(err: bincode::Error) -> Self {
        ProjectError::Codec(err.to_string())
    }
}

impl From<config::ConfigError> for ProjectError {
    fn from(err: config::ConfigError) -> Self {
        ProjectError::ConfigError(err.to_string())
    }
}
