//! CLI command-name contract for logging.

use crate::cli::parse::Commands;

/// Command name recorded on command spans (e.g. "add_image", "remove_change").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::New { .. } => "new",
        Commands::List => "list",
        Commands::Show { .. } => "show",
        Commands::Rename { .. } => "rename",
        Commands::AddImage { .. } => "add_image",
        Commands::RemoveImage { .. } => "remove_image",
        Commands::RemoveChange { .. } => "remove_change",
        Commands::Detect { .. } => "detect",
        Commands::Files { .. } => "files",
    }
}
