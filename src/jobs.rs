//! Background detection jobs
//!
//! A submitted job is represented by a [`JobHandle`] on the owner side and a
//! [`JobCompleter`] on the execution side. The completer is consumed when it
//! reports, so a job delivers exactly one completion; the handle is consumed
//! when awaited, so a finished job cannot be reused.

pub mod executor;

pub use executor::{ChangeDetector, CommandDetector, TokioJobExecutor};

use crate::error::ProjectError;
use crate::layer::{ChangeVariant, ParamMap};
use crate::types::{JobId, LayerId};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// One input image of a detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub id: LayerId,
    pub name: String,
    pub path: PathBuf,
}

/// What the caller asks a detection job to compute
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    /// Name given to the resulting change layer
    pub name: String,
    pub image_t1: ImageInput,
    pub image_t2: ImageInput,
    pub params: ParamMap,
}

/// Identity and declared inputs of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub id: JobId,
    pub variant: ChangeVariant,
    pub name: String,
    pub image_t1: LayerId,
    pub image_t2: LayerId,
}

impl JobTicket {
    pub fn for_request(variant: ChangeVariant, request: &DetectionRequest) -> Self {
        Self {
            id: JobId::new(),
            variant,
            name: request.name.clone(),
            image_t1: request.image_t1.id,
            image_t2: request.image_t2.id,
        }
    }
}

type Outcome = Result<Vec<u8>, String>;

/// The single completion event of a job: encoded payload plus the job itself
#[derive(Debug)]
pub struct JobCompletion {
    pub payload: Vec<u8>,
    pub ticket: JobTicket,
}

/// Owner-side view of an in-flight job
#[derive(Debug)]
pub struct JobHandle {
    ticket: JobTicket,
    receiver: oneshot::Receiver<Outcome>,
}

/// Execution-side sender of a job's one completion
#[derive(Debug)]
pub struct JobCompleter {
    job: JobId,
    sender: oneshot::Sender<Outcome>,
}

impl JobHandle {
    pub fn new(ticket: JobTicket) -> (Self, JobCompleter) {
        let (sender, receiver) = oneshot::channel();
        let completer = JobCompleter {
            job: ticket.id,
            sender,
        };
        (Self { ticket, receiver }, completer)
    }

    pub fn ticket(&self) -> &JobTicket {
        &self.ticket
    }

    pub fn id(&self) -> JobId {
        self.ticket.id
    }

    /// Wait for the job's completion event
    pub async fn wait(self, timeout: Option<Duration>) -> Result<JobCompletion, ProjectError> {
        let job = self.ticket.id;
        let outcome = match timeout {
            Some(after) => tokio::time::timeout(after, self.receiver)
                .await
                .map_err(|_| ProjectError::JobTimeout { job, after })?,
            None => self.receiver.await,
        };
        match outcome {
            Ok(Ok(payload)) => Ok(JobCompletion {
                payload,
                ticket: self.ticket,
            }),
            Ok(Err(reason)) => Err(ProjectError::JobFailed { job, reason }),
            Err(_) => Err(ProjectError::JobFailed {
                job,
                reason: "Completion channel closed".to_string(),
            }),
        }
    }
}

impl JobCompleter {
    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn complete(self, payload: Vec<u8>) {
        self.send(Ok(payload));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.send(Err(reason.into()));
    }

    fn send(self, outcome: Outcome) {
        if self.sender.send(outcome).is_err() {
            debug!(job = %self.job, "Job completion dropped: handle no longer waiting");
        }
    }
}

/// Job execution collaborator
pub trait JobExecutor: Send + Sync {
    /// Schedule a detection and return immediately
    fn submit(
        &self,
        variant: &ChangeVariant,
        request: DetectionRequest,
    ) -> Result<JobHandle, ProjectError>;
}
