//! cdt-project: Project Layer Model for Change Detection
//!
//! A project owns source image layers and the change layers derived from
//! them by background detection jobs. It tracks the artifact files those
//! jobs generate, keeps a metadata store in step, and round-trips through
//! a tagged binary stream resolved by a layer type registry.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod files;
pub mod jobs;
pub mod layer;
pub mod logging;
pub mod project;
pub mod store;
pub mod tree;
pub mod types;

pub use error::{ProjectError, StorageError};
pub use layer::{ChangeLayer, ChangeVariant, ImageLayer, LayerTypeRegistry};
pub use project::{DetectionInputs, Project, ProjectFile, ProjectServices};
pub use types::{FileId, JobId, LayerId, ProjectId, RenderableHandle};
