//! Change layers: the output of a change-detection job between two images.

use crate::codec::{StreamReader, StreamWriter};
use crate::error::ProjectError;
use crate::layer::params::{ParamMap, ParamValue};
use crate::types::{FileId, LayerId, ProjectId, RenderableHandle};
use std::fmt;

pub const TAG_PIXEL_BINARY: &str = "PixelBasedChangeDetectionBinary";
pub const TAG_PIXEL_FROM_TO: &str = "PixelBasedChangeDetectionFromTo";
pub const TAG_OBJECT_BINARY: &str = "ObjectBasedChangeDetectionBinary";
pub const TAG_OBJECT_FROM_TO: &str = "ObjectBasedChangeDetectionFromTo";

/// A detection result key naming a generated file, and the key its
/// registered file id is stored under once the file is tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub path_key: String,
    pub id_key: String,
}

impl ArtifactKey {
    pub fn new(path_key: impl Into<String>, id_key: impl Into<String>) -> Self {
        Self {
            path_key: path_key.into(),
            id_key: id_key.into(),
        }
    }
}

/// Variant registered at runtime under its own tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomVariant {
    pub tag: String,
    pub label: String,
    pub artifacts: Vec<ArtifactKey>,
}

/// Concrete kind of change layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeVariant {
    PixelBinary,
    PixelFromTo,
    ObjectBinary,
    ObjectFromTo,
    Custom(CustomVariant),
}

impl ChangeVariant {
    /// The closed set of built-in variants
    pub fn builtin() -> [ChangeVariant; 4] {
        [
            ChangeVariant::PixelBinary,
            ChangeVariant::PixelFromTo,
            ChangeVariant::ObjectBinary,
            ChangeVariant::ObjectFromTo,
        ]
    }

    /// Stable tag written ahead of the layer state in a project stream
    pub fn tag(&self) -> &str {
        match self {
            ChangeVariant::PixelBinary => TAG_PIXEL_BINARY,
            ChangeVariant::PixelFromTo => TAG_PIXEL_FROM_TO,
            ChangeVariant::ObjectBinary => TAG_OBJECT_BINARY,
            ChangeVariant::ObjectFromTo => TAG_OBJECT_FROM_TO,
            ChangeVariant::Custom(custom) => &custom.tag,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ChangeVariant::PixelBinary => "Pixel-based change detection (binary)",
            ChangeVariant::PixelFromTo => "Pixel-based change detection (from-to)",
            ChangeVariant::ObjectBinary => "Object-based change detection (binary)",
            ChangeVariant::ObjectFromTo => "Object-based change detection (from-to)",
            ChangeVariant::Custom(custom) => &custom.label,
        }
    }

    /// Generated files a detection of this kind reports
    pub fn artifacts(&self) -> Vec<ArtifactKey> {
        match self {
            ChangeVariant::PixelBinary | ChangeVariant::PixelFromTo => {
                vec![ArtifactKey::new("diffPath", "diffImageID")]
            }
            ChangeVariant::ObjectBinary | ChangeVariant::ObjectFromTo => {
                vec![ArtifactKey::new("shapefilePath", "shapefileID")]
            }
            ChangeVariant::Custom(custom) => custom.artifacts.clone(),
        }
    }
}

impl fmt::Display for ChangeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Values a change layer is initialised with after its job completes
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLayerInit {
    pub name: String,
    pub image_t1: LayerId,
    pub image_t2: LayerId,
    pub params: ParamMap,
}

/// Derived layer produced by a change-detection job
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLayer {
    id: LayerId,
    project_id: ProjectId,
    variant: ChangeVariant,
    name: String,
    image_t1: LayerId,
    image_t2: LayerId,
    params: ParamMap,
}

impl ChangeLayer {
    pub fn new(id: LayerId, project_id: ProjectId, variant: ChangeVariant) -> Self {
        Self {
            id,
            project_id,
            variant,
            name: String::new(),
            image_t1: LayerId::nil(),
            image_t2: LayerId::nil(),
            params: ParamMap::new(),
        }
    }

    pub fn init_layer(&mut self, init: ChangeLayerInit) {
        self.name = init.name;
        self.image_t1 = init.image_t1;
        self.image_t2 = init.image_t2;
        self.params = init.params;
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn variant(&self) -> &ChangeVariant {
        &self.variant
    }

    pub fn type_tag(&self) -> &str {
        self.variant.tag()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> (LayerId, LayerId) {
        (self.image_t1, self.image_t2)
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn renderable(&self) -> RenderableHandle {
        RenderableHandle::for_layer(self.id)
    }

    /// Ids of the registered artifacts this layer owns
    pub fn files(&self) -> Vec<FileId> {
        self.variant
            .artifacts()
            .iter()
            .filter_map(|key| self.params.get(&key.id_key))
            .filter_map(ParamValue::as_text)
            .filter_map(|raw| raw.parse().ok())
            .collect()
    }

    pub fn write_state(&self, out: &mut StreamWriter) -> Result<(), ProjectError> {
        out.write(&self.id)?;
        out.write(&self.name)?;
        out.write(&self.image_t1)?;
        out.write(&self.image_t2)?;
        out.write(&self.params)
    }

    pub fn read_state(&mut self, input: &mut StreamReader<'_>) -> Result<(), ProjectError> {
        self.id = input.read()?;
        self.name = input.read()?;
        self.image_t1 = input.read()?;
        self.image_t2 = input.read()?;
        self.params = input.read()?;
        if self.id.is_nil() {
            return Err(ProjectError::InvalidIdentifier("change layer id"));
        }
        Ok(())
    }
}
