//! Job executors
//!
//! [`TokioJobExecutor`] runs a [`ChangeDetector`] on the tokio blocking pool
//! and reports its result through the job's completer. The detector itself is
//! opaque: an in-process implementation or [`CommandDetector`], which shells
//! out to an external program.

use crate::error::ProjectError;
use crate::jobs::{DetectionRequest, JobExecutor, JobHandle, JobTicket};
use crate::layer::params::{encode_params, parse_pairs};
use crate::layer::{ChangeVariant, ParamMap};
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// The change-detection algorithm, consumed as an opaque long-running call
pub trait ChangeDetector: Send + Sync {
    fn detect(
        &self,
        variant: &ChangeVariant,
        request: &DetectionRequest,
    ) -> Result<ParamMap, String>;
}

impl<F> ChangeDetector for F
where
    F: Fn(&ChangeVariant, &DetectionRequest) -> Result<ParamMap, String> + Send + Sync,
{
    fn detect(
        &self,
        variant: &ChangeVariant,
        request: &DetectionRequest,
    ) -> Result<ParamMap, String> {
        self(variant, request)
    }
}

/// Runs detections on a tokio runtime's blocking pool
#[derive(Clone)]
pub struct TokioJobExecutor {
    runtime: Handle,
    detector: Arc<dyn ChangeDetector>,
}

impl TokioJobExecutor {
    pub fn new(runtime: Handle, detector: Arc<dyn ChangeDetector>) -> Self {
        Self { runtime, detector }
    }

    /// Bind to the runtime of the calling context
    pub fn current(detector: Arc<dyn ChangeDetector>) -> Result<Self, ProjectError> {
        let runtime = Handle::try_current()
            .map_err(|e| ProjectError::ConfigError(format!("No tokio runtime: {}", e)))?;
        Ok(Self::new(runtime, detector))
    }
}

impl JobExecutor for TokioJobExecutor {
    fn submit(
        &self,
        variant: &ChangeVariant,
        request: DetectionRequest,
    ) -> Result<JobHandle, ProjectError> {
        let ticket = JobTicket::for_request(variant.clone(), &request);
        let (handle, completer) = JobHandle::new(ticket);
        let detector = Arc::clone(&self.detector);
        let variant = variant.clone();

        info!(job = %handle.id(), variant = %variant, name = %request.name, "Submitting detection job");
        self.runtime.spawn_blocking(move || {
            let started = Instant::now();
            let outcome = detector
                .detect(&variant, &request)
                .and_then(|params| encode_params(&params).map_err(|e| e.to_string()));
            let duration_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(payload) => {
                    debug!(job = %completer.job(), duration_ms, "Detection job finished");
                    completer.complete(payload);
                }
                Err(reason) => {
                    warn!(job = %completer.job(), duration_ms, reason = %reason, "Detection job failed");
                    completer.fail(reason);
                }
            }
        });
        Ok(handle)
    }
}

/// Detector backed by an external program.
///
/// The program is invoked as
/// `<program> <args>... --variant <tag> --name <name> --t1 <path> --t2 <path> [--param k=v]...`
/// and must print its result parameters as `key=value` lines on stdout.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, variant: &ChangeVariant, request: &DetectionRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--variant")
            .arg(variant.tag())
            .arg("--name")
            .arg(&request.name)
            .arg("--t1")
            .arg(&request.image_t1.path)
            .arg("--t2")
            .arg(&request.image_t2.path);
        for (key, value) in &request.params {
            command.arg("--param").arg(format!("{}={}", key, value));
        }
        command
    }
}

impl ChangeDetector for CommandDetector {
    fn detect(
        &self,
        variant: &ChangeVariant,
        request: &DetectionRequest,
    ) -> Result<ParamMap, String> {
        let output = self
            .command(variant, request)
            .output()
            .map_err(|e| format!("Failed to run '{}': {}", self.program, e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_pairs(stdout.lines()))
    }
}
