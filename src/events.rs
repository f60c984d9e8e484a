//! Project notifications and the canvas collaborator.
//!
//! The project never calls the canvas directly. It pushes one-way events on
//! an in-process bus; whoever owns the canvas drains the receiver and applies
//! them with [`dispatch_events`].

use crate::types::{ProjectId, RenderableHandle};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::trace;

/// Notification raised by a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectEvent {
    /// A structural or metadata mutation happened
    Changed(ProjectId),
    /// A layer with a drawable handle was attached
    LayerAttached(RenderableHandle),
    /// The renderer should drop these handles
    LayersRemoved(Vec<RenderableHandle>),
    /// The first image was added; the viewport should show everything
    ZoomToFullExtent,
}

/// Fire-and-forget event sender
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Option<Sender<ProjectEvent>>,
}

impl EventBus {
    pub fn new_pair() -> (Self, Receiver<ProjectEvent>) {
        let (sender, receiver) = channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Bus with no listener; every event is discarded
    pub fn detached() -> Self {
        Self { sender: None }
    }

    /// Send an event; a missing or closed receiver is not an error
    pub fn emit(&self, event: ProjectEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(err) = sender.send(event) {
            trace!(event = ?err.0, "Project event dropped: no listener");
        }
    }
}

/// Map-canvas collaborator
pub trait Canvas {
    fn attach(&mut self, handle: RenderableHandle);
    fn detach(&mut self, handles: &[RenderableHandle]);
    fn zoom_to_full_extent(&mut self);
}

/// Apply every pending canvas event to `canvas`.
///
/// `Changed` notifications are returned in order so the caller can refresh
/// whatever views it keeps. Never blocks.
pub fn dispatch_events(
    receiver: &Receiver<ProjectEvent>,
    canvas: &mut dyn Canvas,
) -> Vec<ProjectId> {
    let mut changed = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        match event {
            ProjectEvent::Changed(project_id) => changed.push(project_id),
            ProjectEvent::LayerAttached(handle) => canvas.attach(handle),
            ProjectEvent::LayersRemoved(handles) => canvas.detach(&handles),
            ProjectEvent::ZoomToFullExtent => canvas.zoom_to_full_extent(),
        }
    }
    changed
}
