//! Project byte stream
//!
//! Layout, in order:
//!
//! 1. project id
//! 2. project name
//! 3. file registry, as a length-prefixed block
//! 4. image-layer count, then each image layer's state in collection order
//! 5. change-layer count, then for each change layer its type tag followed
//!    by its state
//!
//! Loading parses the whole stream before anything is persisted or attached.
//! A stream that fails to parse leaves no trace in the metadata store and
//! emits no events.

use crate::codec::{StreamReader, StreamWriter};
use crate::error::ProjectError;
use crate::files::FileRegistry;
use crate::layer::{ImageLayer, LayerTypeRegistry};
use crate::project::{Project, ProjectServices};
use crate::store::ImageLayerRow;
use crate::types::ProjectId;
use tracing::{debug, info};

impl Project {
    /// Encode the whole project
    pub fn serialize(&self) -> Result<Vec<u8>, ProjectError> {
        let mut out = StreamWriter::new();
        out.write(&self.id)?;
        out.write(&self.name)?;
        out.write_block(&self.files.to_block()?)?;

        out.write_count(self.images.len())?;
        for image in &self.images {
            image.write_state(&mut out)?;
        }

        out.write_count(self.changes.len())?;
        for change in &self.changes {
            out.write(change.type_tag())?;
            change.write_state(&mut out)?;
        }

        debug!(project_id = %self.id, bytes = out.len(), "Project serialized");
        Ok(out.into_bytes())
    }

    /// Rebuild a project from a stream written by [`Project::serialize`].
    ///
    /// Change layers are reconstructed through `registry`; a tag with no
    /// registered factory fails the whole load with
    /// [`ProjectError::UnknownLayerType`].
    pub fn deserialize(
        bytes: &[u8],
        registry: &LayerTypeRegistry,
        services: ProjectServices,
    ) -> Result<Project, ProjectError> {
        let mut input = StreamReader::new(bytes);
        let id: ProjectId = input.read()?;
        if id.is_nil() {
            return Err(ProjectError::InvalidIdentifier("project id"));
        }
        let name: String = input.read()?;
        let files = FileRegistry::from_block(input.read_block()?)?;

        let count = input.read_count()?;
        let mut images = Vec::new();
        for _ in 0..count {
            let mut image = ImageLayer::unbound(id);
            image.read_state(&mut input)?;
            images.push(image);
        }

        let count = input.read_count()?;
        let mut changes = Vec::new();
        for _ in 0..count {
            let tag: String = input.read()?;
            let mut change = registry.create(&tag, id)?;
            change.read_state(&mut input)?;
            changes.push(change);
        }
        input.finish()?;

        // A row that already exists belongs to another live value
        let owns_rows = services.store.lookup_name(id)?.is_none();
        services.store.upsert(id, &name)?;
        // From here on, dropping `project` on error removes rows it owns.
        let mut project = Project::assemble(id, name, files, services, owns_rows);
        for image in images {
            project.services.store.insert_image_layer(&ImageLayerRow {
                id: image.id(),
                project_id: id,
                name: image.name().to_string(),
                path: image.path().to_path_buf(),
            })?;
            project.attach_image(image)?;
        }
        for change in changes {
            project.attach_change(change)?;
        }

        info!(
            project_id = %project.id,
            images = project.images.len(),
            changes = project.changes.len(),
            files = project.files.len(),
            "Project loaded"
        );
        project.notify_changed();
        Ok(project)
    }
}
