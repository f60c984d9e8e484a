//! Source imagery layers and their dependent sub-layers.

use crate::codec::{StreamReader, StreamWriter};
use crate::error::ProjectError;
use crate::types::{FileId, LayerId, ProjectId, RenderableHandle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of layer derived from a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubLayerKind {
    Extraction,
    Segmentation,
}

/// Layer derived from one image (feature extraction or segmentation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLayer {
    pub id: LayerId,
    pub name: String,
    pub kind: SubLayerKind,
    /// Artifacts this sub-layer owns in the project's file registry
    pub files: Vec<FileId>,
}

impl SubLayer {
    pub fn new(name: impl Into<String>, kind: SubLayerKind, files: Vec<FileId>) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            kind,
            files,
        }
    }

    pub fn renderable(&self) -> RenderableHandle {
        RenderableHandle::for_layer(self.id)
    }
}

/// Source image layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLayer {
    id: LayerId,
    project_id: ProjectId,
    name: String,
    path: PathBuf,
    extractions: Vec<SubLayer>,
    segmentations: Vec<SubLayer>,
}

impl ImageLayer {
    /// Create an image layer with a fresh id
    pub fn new(project_id: ProjectId, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: LayerId::new(),
            project_id,
            name: name.into(),
            path: path.into(),
            extractions: Vec::new(),
            segmentations: Vec::new(),
        }
    }

    /// Empty layer bound to a project, to be populated by [`ImageLayer::read_state`]
    pub fn unbound(project_id: ProjectId) -> Self {
        Self {
            id: LayerId::nil(),
            project_id,
            name: String::new(),
            path: PathBuf::new(),
            extractions: Vec::new(),
            segmentations: Vec::new(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn renderable(&self) -> RenderableHandle {
        RenderableHandle::for_layer(self.id)
    }

    pub fn extractions(&self) -> &[SubLayer] {
        &self.extractions
    }

    pub fn segmentations(&self) -> &[SubLayer] {
        &self.segmentations
    }

    pub fn add_sub_layer(&mut self, sub_layer: SubLayer) -> LayerId {
        let id = sub_layer.id;
        match sub_layer.kind {
            SubLayerKind::Extraction => self.extractions.push(sub_layer),
            SubLayerKind::Segmentation => self.segmentations.push(sub_layer),
        }
        id
    }

    /// Detach every extraction and segmentation layer, extractions first
    pub fn release_sub_layers(&mut self) -> Vec<SubLayer> {
        let mut released = std::mem::take(&mut self.extractions);
        released.append(&mut self.segmentations);
        released
    }

    /// Every layer id this image layer owns, including its own
    pub fn owned_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        std::iter::once(self.id).chain(
            self.extractions
                .iter()
                .chain(self.segmentations.iter())
                .map(|s| s.id),
        )
    }

    pub fn write_state(&self, out: &mut StreamWriter) -> Result<(), ProjectError> {
        out.write(&self.id)?;
        out.write(&self.name)?;
        out.write(&self.path)?;
        out.write_count(self.extractions.len())?;
        for sub in &self.extractions {
            out.write(sub)?;
        }
        out.write_count(self.segmentations.len())?;
        for sub in &self.segmentations {
            out.write(sub)?;
        }
        Ok(())
    }

    pub fn read_state(&mut self, input: &mut StreamReader<'_>) -> Result<(), ProjectError> {
        self.id = input.read()?;
        self.name = input.read()?;
        self.path = input.read()?;
        let count = input.read_count()?;
        self.extractions = (0..count)
            .map(|_| input.read::<SubLayer>())
            .collect::<Result<_, _>>()?;
        let count = input.read_count()?;
        self.segmentations = (0..count)
            .map(|_| input.read::<SubLayer>())
            .collect::<Result<_, _>>()?;
        if self.id.is_nil() {
            return Err(ProjectError::InvalidIdentifier("image layer id"));
        }
        Ok(())
    }
}
