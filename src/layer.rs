//! Project Layers
//!
//! Image layers hold source imagery; change layers hold the output of
//! change-detection jobs and are reconstructed through the layer type registry.

pub mod change;
pub mod image;
pub mod params;
pub mod registry;

pub use change::{ArtifactKey, ChangeLayer, ChangeLayerInit, ChangeVariant, CustomVariant};
pub use image::{ImageLayer, SubLayer, SubLayerKind};
pub use params::{ParamMap, ParamValue};
pub use registry::{ChangeLayerFactory, LayerTypeRegistry};
