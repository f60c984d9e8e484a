//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ProjectError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ProjectError) -> String {
    match e {
        ProjectError::Precondition { .. } => format!("Cannot start detection: {}", e),
        ProjectError::UnknownLayerType(_) => format!(
            "{} (the project was saved with a change layer type this build does not know)",
            e
        ),
        _ => e.to_string(),
    }
}
