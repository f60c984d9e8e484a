//! CLI parse: clap types for cdt. No behavior; definitions only.

use crate::layer::change::TAG_PIXEL_BINARY;
use crate::types::{LayerId, ProjectId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cdt - change-detection project manager
#[derive(Parser)]
#[command(name = "cdt")]
#[command(about = "Manage change-detection projects: imagery, detection jobs and their artifacts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new, empty project
    New {
        name: String,
    },
    /// List saved projects
    List,
    /// Show a project's tree and layers
    Show {
        project: ProjectId,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Rename a project
    Rename {
        project: ProjectId,
        name: String,
    },
    /// Add a source image layer
    AddImage {
        project: ProjectId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        path: PathBuf,
    },
    /// Remove one image layer, or all of them
    RemoveImage {
        project: ProjectId,
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<LayerId>,
        #[arg(long)]
        all: bool,
    },
    /// Remove one change layer, or all of them
    RemoveChange {
        project: ProjectId,
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<LayerId>,
        #[arg(long)]
        all: bool,
    },
    /// Run a change detection between two image layers and attach the result
    Detect {
        project: ProjectId,
        /// Earlier image layer
        #[arg(long)]
        t1: LayerId,
        /// Later image layer
        #[arg(long)]
        t2: LayerId,
        /// Name of the resulting change layer
        #[arg(long)]
        name: String,
        /// Change layer type tag
        #[arg(long, default_value = TAG_PIXEL_BINARY)]
        variant: String,
        /// Detector parameter as key=value (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// List the artifact files a project tracks
    Files {
        project: ProjectId,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
