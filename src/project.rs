//! Project aggregate
//!
//! A [`Project`] owns its image and change layers, the registry of generated
//! artifacts, and the bookkeeping for detection jobs it started. Every
//! structural mutation goes through `&mut self`, so mutations are strictly
//! ordered; collaborators are reached only through [`ProjectServices`].
//!
//! Metadata store calls happen before the in-memory mutation. When a store
//! call fails the operation returns [`ProjectError::Persistence`] and the
//! project is left exactly as it was.

pub mod serialize;
pub mod storage;

pub use storage::ProjectFile;

use crate::error::ProjectError;
use crate::events::{EventBus, ProjectEvent};
use crate::files::FileRegistry;
use crate::jobs::{DetectionRequest, ImageInput, JobCompletion, JobExecutor, JobHandle};
use crate::layer::params::decode_params;
use crate::layer::{
    ChangeLayer, ChangeLayerInit, ChangeVariant, ImageLayer, ParamMap, ParamValue, SubLayer,
    SubLayerKind,
};
use crate::store::{ImageLayerRow, MetadataStore};
use crate::tree::ProjectTree;
use crate::types::{FileId, JobId, LayerId, ProjectId, RenderableHandle};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Images a project must have before a detection may start
pub const MIN_DETECTION_IMAGES: usize = 2;

/// Collaborators a project talks to
#[derive(Clone)]
pub struct ProjectServices {
    pub store: Arc<dyn MetadataStore>,
    pub executor: Arc<dyn JobExecutor>,
    pub events: EventBus,
    /// Delete artifact files from disk when their owning layer is removed
    pub purge_artifacts: bool,
}

impl ProjectServices {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        executor: Arc<dyn JobExecutor>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            executor,
            events,
            purge_artifacts: false,
        }
    }

    pub fn with_purge_artifacts(mut self, purge: bool) -> Self {
        self.purge_artifacts = purge;
        self
    }
}

impl fmt::Debug for ProjectServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectServices")
            .field("events", &self.events)
            .field("purge_artifacts", &self.purge_artifacts)
            .finish_non_exhaustive()
    }
}

/// Inputs of a detection, expressed against the project's own image layers
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionInputs {
    pub name: String,
    pub image_t1: LayerId,
    pub image_t2: LayerId,
    pub params: ParamMap,
}

/// Aggregate root for one analysis session
pub struct Project {
    id: ProjectId,
    name: String,
    images: Vec<ImageLayer>,
    changes: Vec<ChangeLayer>,
    files: FileRegistry,
    pending_jobs: HashSet<JobId>,
    services: ProjectServices,
    /// Whether dropping this value deletes the project's metadata rows
    owns_rows: bool,
}

impl Project {
    /// Create a project with a fresh id and record it in the metadata store
    pub fn create(name: impl Into<String>, services: ProjectServices) -> Result<Self, ProjectError> {
        Self::with_id(ProjectId::new(), name, services)
    }

    /// Create a project under an existing id
    pub fn with_id(
        id: ProjectId,
        name: impl Into<String>,
        services: ProjectServices,
    ) -> Result<Self, ProjectError> {
        if id.is_nil() {
            return Err(ProjectError::InvalidIdentifier("project id"));
        }
        let name = name.into();
        services.store.upsert(id, &name)?;
        info!(project_id = %id, name = %name, "Project created");
        Ok(Self::assemble(id, name, FileRegistry::new(), services, true))
    }

    /// Re-open a project whose row is already in the metadata store.
    ///
    /// The returned value is a view: dropping it leaves the rows in place,
    /// since another live `Project` may own them. Returns `Ok(None)` when the
    /// store has no row for `id`.
    pub fn open(id: ProjectId, services: ProjectServices) -> Result<Option<Self>, ProjectError> {
        if id.is_nil() {
            return Err(ProjectError::InvalidIdentifier("project id"));
        }
        let Some(name) = services.store.lookup_name(id)? else {
            return Ok(None);
        };
        debug!(project_id = %id, name = %name, "Project opened from metadata store");
        Ok(Some(Self::assemble(id, name, FileRegistry::new(), services, false)))
    }

    fn assemble(
        id: ProjectId,
        name: String,
        files: FileRegistry,
        services: ProjectServices,
        owns_rows: bool,
    ) -> Self {
        Self {
            id,
            name,
            images: Vec::new(),
            changes: Vec::new(),
            files,
            pending_jobs: HashSet::new(),
            services,
            owns_rows,
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn images(&self) -> &[ImageLayer] {
        &self.images
    }

    pub fn changes(&self) -> &[ChangeLayer] {
        &self.changes
    }

    pub fn image(&self, layer_id: LayerId) -> Option<&ImageLayer> {
        self.images.iter().find(|l| l.id() == layer_id)
    }

    pub fn change(&self, layer_id: LayerId) -> Option<&ChangeLayer> {
        self.changes.iter().find(|l| l.id() == layer_id)
    }

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn services(&self) -> &ProjectServices {
        &self.services
    }

    /// Jobs started by this project whose completion has not been applied
    pub fn pending_jobs(&self) -> usize {
        self.pending_jobs.len()
    }

    pub fn is_pending(&self, job: JobId) -> bool {
        self.pending_jobs.contains(&job)
    }

    /// Current tree view, derived from the layer collections
    pub fn tree(&self) -> ProjectTree {
        ProjectTree::build(&self.name, &self.images, &self.changes)
    }

    fn notify_changed(&self) {
        self.services.events.emit(ProjectEvent::Changed(self.id));
    }

    /// Rename the project.
    ///
    /// Returns `Ok(false)` without touching the store when the name is unchanged.
    pub fn rename(&mut self, new_name: &str) -> Result<bool, ProjectError> {
        if new_name == self.name {
            return Ok(false);
        }
        self.services.store.upsert(self.id, new_name)?;
        info!(project_id = %self.id, from = %self.name, to = %new_name, "Project renamed");
        self.name = new_name.to_string();
        self.notify_changed();
        Ok(true)
    }

    fn owns_layer(&self, layer_id: LayerId) -> bool {
        self.images.iter().any(|l| l.owned_ids().any(|id| id == layer_id))
            || self.changes.iter().any(|l| l.id() == layer_id)
    }

    /// Single entry point for image layers joining the collection
    fn attach_image(&mut self, layer: ImageLayer) -> Result<(), ProjectError> {
        if let Some(dup) = layer.owned_ids().find(|id| self.owns_layer(*id)) {
            return Err(ProjectError::DuplicateLayer(dup));
        }
        let handles: Vec<RenderableHandle> = layer.owned_ids().map(RenderableHandle::for_layer).collect();
        debug!(project_id = %self.id, layer_id = %layer.id(), "Attaching image layer");
        self.images.push(layer);
        for handle in handles {
            self.services.events.emit(ProjectEvent::LayerAttached(handle));
        }
        Ok(())
    }

    /// Single entry point for change layers joining the collection
    fn attach_change(&mut self, layer: ChangeLayer) -> Result<(), ProjectError> {
        if self.owns_layer(layer.id()) {
            return Err(ProjectError::DuplicateLayer(layer.id()));
        }
        let handle = layer.renderable();
        debug!(project_id = %self.id, layer_id = %layer.id(), variant = %layer.variant(), "Attaching change layer");
        self.changes.push(layer);
        self.services.events.emit(ProjectEvent::LayerAttached(handle));
        Ok(())
    }

    /// Add a source image at the tail of the image collection
    pub fn add_image_layer(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<&ImageLayer, ProjectError> {
        let layer = ImageLayer::new(self.id, name, path);
        let row = ImageLayerRow {
            id: layer.id(),
            project_id: self.id,
            name: layer.name().to_string(),
            path: layer.path().to_path_buf(),
        };
        self.services.store.insert_image_layer(&row)?;

        let first = self.images.is_empty();
        let layer_id = layer.id();
        if let Err(err) = self.attach_image(layer) {
            if let Err(store_err) = self.services.store.remove_image_layer(self.id, layer_id) {
                warn!(layer_id = %layer_id, error = %store_err, "Failed to roll back image-layer row");
            }
            return Err(err);
        }
        info!(project_id = %self.id, layer_id = %layer_id, name = %row.name, "Image layer added");
        if first {
            self.services.events.emit(ProjectEvent::ZoomToFullExtent);
        }
        self.notify_changed();
        Ok(&self.images[self.images.len() - 1])
    }

    /// Attach an extraction or segmentation layer to an image, registering
    /// the artifacts it produced.
    pub fn add_image_sub_layer(
        &mut self,
        image_id: LayerId,
        name: impl Into<String>,
        kind: SubLayerKind,
        artifacts: Vec<PathBuf>,
    ) -> Result<LayerId, ProjectError> {
        let index = self
            .images
            .iter()
            .position(|l| l.id() == image_id)
            .ok_or(ProjectError::UnknownImage(image_id))?;

        let file_ids: Vec<FileId> = artifacts
            .into_iter()
            .map(|path| {
                let file_id = FileId::new();
                self.files.register_path(file_id, path);
                file_id
            })
            .collect();
        let sub_layer = SubLayer::new(name, kind, file_ids);
        let handle = sub_layer.renderable();
        let sub_id = self.images[index].add_sub_layer(sub_layer);

        debug!(project_id = %self.id, image_id = %image_id, sub_layer = %sub_id, ?kind, "Sub-layer added");
        self.services.events.emit(ProjectEvent::LayerAttached(handle));
        self.notify_changed();
        Ok(sub_id)
    }

    fn release_files(&mut self, file_ids: &[FileId]) {
        for file_id in file_ids {
            let Some(entry) = self.files.remove(file_id) else {
                continue;
            };
            if self.services.purge_artifacts {
                let removed = entry.purge();
                debug!(file_id = %file_id, removed, "Purged artifact files");
            }
        }
    }

    /// Remove an image layer and everything derived from it.
    ///
    /// Returns `Ok(false)` if the layer is not owned by this project.
    pub fn remove_image_layer(&mut self, layer_id: LayerId) -> Result<bool, ProjectError> {
        let Some(index) = self.images.iter().position(|l| l.id() == layer_id) else {
            return Ok(false);
        };
        self.services.store.remove_image_layer(self.id, layer_id)?;

        let sub_layers = self.images[index].release_sub_layers();
        let mut handles = Vec::with_capacity(sub_layers.len() + 1);
        for sub_layer in &sub_layers {
            self.release_files(&sub_layer.files);
            handles.push(sub_layer.renderable());
        }
        let layer = self.images.remove(index);
        handles.push(layer.renderable());

        info!(
            project_id = %self.id,
            layer_id = %layer_id,
            sub_layers = sub_layers.len(),
            "Image layer removed"
        );
        self.services.events.emit(ProjectEvent::LayersRemoved(handles));
        self.notify_changed();
        Ok(true)
    }

    /// Remove every image layer; returns how many were removed
    pub fn remove_all_image_layers(&mut self) -> Result<usize, ProjectError> {
        let snapshot: Vec<LayerId> = self.images.iter().map(|l| l.id()).collect();
        let mut removed = 0;
        for layer_id in snapshot {
            if self.remove_image_layer(layer_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove a change layer and release the artifacts it owns.
    ///
    /// Returns `Ok(false)` if the layer is not owned by this project.
    pub fn remove_change_layer(&mut self, layer_id: LayerId) -> Result<bool, ProjectError> {
        let Some(index) = self.changes.iter().position(|l| l.id() == layer_id) else {
            return Ok(false);
        };
        let files = self.changes[index].files();
        self.release_files(&files);
        let layer = self.changes.remove(index);

        info!(project_id = %self.id, layer_id = %layer_id, files = files.len(), "Change layer removed");
        self.services
            .events
            .emit(ProjectEvent::LayersRemoved(vec![layer.renderable()]));
        self.notify_changed();
        Ok(true)
    }

    pub fn remove_all_change_layers(&mut self) -> Result<usize, ProjectError> {
        let snapshot: Vec<LayerId> = self.changes.iter().map(|l| l.id()).collect();
        let mut removed = 0;
        for layer_id in snapshot {
            if self.remove_change_layer(layer_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn registered_image_count(&self, project_id: ProjectId) -> Result<usize, ProjectError> {
        if project_id.is_nil() {
            return Err(ProjectError::InvalidIdentifier("project id"));
        }
        Ok(self.services.store.count_image_layers(project_id)?)
    }

    /// Whether the metadata store holds enough image layers for `project_id`
    /// to run a detection
    pub fn is_detection_enabled(&self, project_id: ProjectId) -> Result<bool, ProjectError> {
        Ok(self.registered_image_count(project_id)? >= MIN_DETECTION_IMAGES)
    }

    fn image_input(&self, layer_id: LayerId) -> Result<ImageInput, ProjectError> {
        let layer = self
            .image(layer_id)
            .ok_or(ProjectError::UnknownImage(layer_id))?;
        Ok(ImageInput {
            id: layer.id(),
            name: layer.name().to_string(),
            path: layer.path().to_path_buf(),
        })
    }

    pub fn start_pixel_change_detection_binary(
        &mut self,
        project_id: ProjectId,
        inputs: DetectionInputs,
    ) -> Result<JobHandle, ProjectError> {
        self.start_change_detection(project_id, ChangeVariant::PixelBinary, inputs)
    }

    /// Submit a detection job and return its handle without waiting.
    ///
    /// Fails with [`ProjectError::Precondition`] when fewer than
    /// [`MIN_DETECTION_IMAGES`] images are registered; nothing is submitted.
    pub fn start_change_detection(
        &mut self,
        project_id: ProjectId,
        variant: ChangeVariant,
        inputs: DetectionInputs,
    ) -> Result<JobHandle, ProjectError> {
        let image_count = self.registered_image_count(project_id)?;
        if image_count < MIN_DETECTION_IMAGES {
            return Err(ProjectError::Precondition {
                image_count,
                required: MIN_DETECTION_IMAGES,
            });
        }
        let request = DetectionRequest {
            name: inputs.name,
            image_t1: self.image_input(inputs.image_t1)?,
            image_t2: self.image_input(inputs.image_t2)?,
            params: inputs.params,
        };

        let handle = self.services.executor.submit(&variant, request)?;
        self.pending_jobs.insert(handle.id());
        info!(project_id = %self.id, job = %handle.id(), variant = %variant, "Detection started");
        Ok(handle)
    }

    pub fn on_pixel_change_detection_binary_completed(
        &mut self,
        completion: JobCompletion,
    ) -> Result<LayerId, ProjectError> {
        self.on_change_detection_completed(completion)
    }

    /// Turn a job's completion into a new change layer.
    ///
    /// The completion is consumed even when it is rejected: a job's result is
    /// applied at most once.
    pub fn on_change_detection_completed(
        &mut self,
        completion: JobCompletion,
    ) -> Result<LayerId, ProjectError> {
        let JobCompletion { payload, ticket } = completion;
        if !self.pending_jobs.remove(&ticket.id) {
            return Err(ProjectError::StaleJob(ticket.id));
        }

        let mut params = decode_params(&payload)?;
        let artifacts = ticket.variant.artifacts();
        let mut paths = Vec::with_capacity(artifacts.len());
        for key in &artifacts {
            // detector output is loosely typed; `20210101` is still a path
            let path = match params.get(&key.path_key) {
                Some(ParamValue::List(_)) | None => {
                    return Err(ProjectError::MalformedJobResult(key.path_key.clone()));
                }
                Some(value) => value.to_string(),
            };
            paths.push(PathBuf::from(path));
        }

        for (key, path) in artifacts.iter().zip(paths) {
            let file_id = FileId::new();
            self.files.register_path(file_id, path);
            params.remove(&key.path_key);
            params.insert(key.id_key.clone(), file_id.to_string().into());
        }

        let mut layer = ChangeLayer::new(LayerId::new(), self.id, ticket.variant);
        layer.init_layer(ChangeLayerInit {
            name: ticket.name,
            image_t1: ticket.image_t1,
            image_t2: ticket.image_t2,
            params,
        });
        let layer_id = layer.id();
        self.attach_change(layer)?;

        info!(project_id = %self.id, job = %ticket.id, layer_id = %layer_id, "Detection completed");
        self.notify_changed();
        Ok(layer_id)
    }

    /// Await a job on the owner task and apply its completion.
    ///
    /// A job that times out or fails is abandoned; nothing is attached.
    pub async fn complete_detection(
        &mut self,
        handle: JobHandle,
        timeout: Option<Duration>,
    ) -> Result<LayerId, ProjectError> {
        let job = handle.id();
        match handle.wait(timeout).await {
            Ok(completion) => self.on_change_detection_completed(completion),
            Err(err) => {
                self.abandon_job(job);
                warn!(project_id = %self.id, job = %job, error = %err, "Detection abandoned");
                Err(err)
            }
        }
    }

    /// Forget a pending job; a later completion for it is stale
    pub fn abandon_job(&mut self, job: JobId) -> bool {
        self.pending_jobs.remove(&job)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("images", &self.images.len())
            .field("changes", &self.changes.len())
            .field("files", &self.files.len())
            .field("pending_jobs", &self.pending_jobs.len())
            .finish()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if self.id.is_nil() || !self.owns_rows {
            return;
        }
        match self.services.store.delete_project(self.id) {
            Ok(()) => debug!(project_id = %self.id, "Project rows deleted"),
            Err(e) => warn!(project_id = %self.id, error = %e, "Failed to delete project rows"),
        }
    }
}
