//! CLI route: single route table and run context.
//!
//! Each command loads the project file, applies one operation and saves it
//! back. The metadata store holds rows only while a project is loaded.

use crate::cli::help::command_name;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_files_json, format_files_text, format_project_json, format_project_list,
    format_project_text,
};
use crate::config::{CdtConfig, ConfigLoader};
use crate::error::{ProjectError, StorageError};
use crate::events::{dispatch_events, Canvas, EventBus, ProjectEvent};
use crate::jobs::{ChangeDetector, CommandDetector, DetectionRequest, JobExecutor, TokioJobExecutor};
use crate::layer::params::parse_pairs;
use crate::layer::{ChangeVariant, LayerTypeRegistry, ParamMap};
use crate::project::{DetectionInputs, Project, ProjectFile, ProjectServices};
use crate::store::SledMetadataStore;
use crate::types::{LayerId, ProjectId, RenderableHandle};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span};

/// Canvas for a headless process: records requests in the log
struct TraceCanvas;

impl Canvas for TraceCanvas {
    fn attach(&mut self, handle: RenderableHandle) {
        debug!(handle = %handle, "Canvas attach");
    }

    fn detach(&mut self, handles: &[RenderableHandle]) {
        debug!(count = handles.len(), "Canvas detach");
    }

    fn zoom_to_full_extent(&mut self) {
        debug!("Canvas zoom to full extent");
    }
}

/// Runtime context for CLI execution: workspace, config, and collaborators.
pub struct RunContext {
    workspace_root: PathBuf,
    config: CdtConfig,
    projects_dir: PathBuf,
    registry: LayerTypeRegistry,
    store: Arc<SledMetadataStore>,
    executor: Arc<dyn JobExecutor>,
    runtime: tokio::runtime::Runtime,
    events: EventBus,
    receiver: Receiver<ProjectEvent>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ProjectError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ProjectError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        let metadata_dir = config.system.storage.metadata_dir(&workspace_root);
        std::fs::create_dir_all(&metadata_dir).map_err(StorageError::from)?;
        let store = Arc::new(SledMetadataStore::new(&metadata_dir)?);
        let projects_dir = config.system.storage.projects_dir(&workspace_root);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ProjectError::ConfigError(format!("Failed to start job runtime: {}", e)))?;
        let detector: Arc<dyn ChangeDetector> = match &config.jobs.detector_command {
            Some(command) => Arc::new(CommandDetector::new(
                command.clone(),
                config.jobs.detector_args.clone(),
            )),
            None => Arc::new(
                |_: &ChangeVariant, _: &DetectionRequest| -> Result<ParamMap, String> {
                    Err("No detector configured".to_string())
                },
            ),
        };
        let executor: Arc<dyn JobExecutor> =
            Arc::new(TokioJobExecutor::new(runtime.handle().clone(), detector));
        let (events, receiver) = EventBus::new_pair();

        debug!(
            workspace = %workspace_root.display(),
            projects_dir = %projects_dir.display(),
            "Run context ready"
        );
        Ok(Self {
            workspace_root,
            config,
            projects_dir,
            registry: LayerTypeRegistry::with_builtin(),
            store,
            executor,
            runtime,
            events,
            receiver,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    fn services(&self) -> ProjectServices {
        ProjectServices::new(self.store.clone(), self.executor.clone(), self.events.clone())
            .with_purge_artifacts(self.config.system.storage.purge_artifacts)
    }

    fn load(&self, project_id: ProjectId) -> Result<Project, ProjectError> {
        ProjectFile::load_id(&self.projects_dir, project_id, &self.registry, self.services())
    }

    fn save(&self, project: &Project) -> Result<(), ProjectError> {
        ProjectFile::save(&self.projects_dir, project)?;
        Ok(())
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ProjectError> {
        let span = info_span!("command", name = command_name(command));
        let _guard = span.enter();
        let started = Instant::now();

        let result = self.execute_inner(command);
        let changed = dispatch_events(&self.receiver, &mut TraceCanvas);
        info!(
            ok = result.is_ok(),
            changed = changed.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ProjectError> {
        match command {
            Commands::New { name } => {
                let project = Project::create(name.clone(), self.services())?;
                self.save(&project)?;
                Ok(project.id().to_string())
            }
            Commands::List => {
                let mut rows = Vec::new();
                for project_id in ProjectFile::list(&self.projects_dir)? {
                    let project = self.load(project_id)?;
                    rows.push((project.id(), project.name().to_string()));
                }
                Ok(format_project_list(&rows))
            }
            Commands::Show { project, format } => {
                let project = self.load(*project)?;
                if format == "json" {
                    format_project_json(&project)
                } else {
                    Ok(format_project_text(&project))
                }
            }
            Commands::Rename { project, name } => {
                let mut project = self.load(*project)?;
                if project.rename(name)? {
                    self.save(&project)?;
                    Ok(format!("Project renamed to '{}'", name))
                } else {
                    Ok(format!("Project is already named '{}'", name))
                }
            }
            Commands::AddImage {
                project,
                name,
                path,
            } => {
                let mut project = self.load(*project)?;
                let layer_id = project.add_image_layer(name.clone(), path.clone())?.id();
                self.save(&project)?;
                Ok(layer_id.to_string())
            }
            Commands::RemoveImage { project, id, all } => {
                let mut project = self.load(*project)?;
                let message = if *all {
                    format!("Removed {} image layer(s)", project.remove_all_image_layers()?)
                } else {
                    self.remove_one(id, |layer_id| project.remove_image_layer(layer_id))?
                };
                self.save(&project)?;
                Ok(message)
            }
            Commands::RemoveChange { project, id, all } => {
                let mut project = self.load(*project)?;
                let message = if *all {
                    format!("Removed {} change layer(s)", project.remove_all_change_layers()?)
                } else {
                    self.remove_one(id, |layer_id| project.remove_change_layer(layer_id))?
                };
                self.save(&project)?;
                Ok(message)
            }
            Commands::Detect {
                project,
                t1,
                t2,
                name,
                variant,
                params,
            } => {
                let mut project = self.load(*project)?;
                let variant = self.registry.create(variant, project.id())?.variant().clone();
                if self.config.jobs.detector_command.is_none() {
                    return Err(ProjectError::ConfigError(
                        "No detector configured: set jobs.detector_command".to_string(),
                    ));
                }
                let inputs = DetectionInputs {
                    name: name.clone(),
                    image_t1: *t1,
                    image_t2: *t2,
                    params: parse_pairs(params.iter().map(String::as_str)),
                };
                let project_id = project.id();
                let handle = project.start_change_detection(project_id, variant, inputs)?;
                let layer_id = self
                    .runtime
                    .block_on(project.complete_detection(handle, self.config.jobs.timeout()))?;
                self.save(&project)?;
                Ok(layer_id.to_string())
            }
            Commands::Files { project, format } => {
                let project = self.load(*project)?;
                if format == "json" {
                    format_files_json(&project)
                } else {
                    Ok(format_files_text(&project))
                }
            }
        }
    }

    fn remove_one(
        &self,
        id: &Option<LayerId>,
        remove: impl FnOnce(LayerId) -> Result<bool, ProjectError>,
    ) -> Result<String, ProjectError> {
        let Some(layer_id) = *id else {
            return Ok("Nothing to remove".to_string());
        };
        Ok(if remove(layer_id)? {
            format!("Removed layer {}", layer_id)
        } else {
            format!("Layer {} is not part of this project", layer_id)
        })
    }
}
