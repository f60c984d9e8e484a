//! Merge rules: built-in defaults every later source overrides.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the default values applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("system.storage.metadata_path", ".cdt/metadata")?
        .set_default("system.storage.projects_path", ".cdt/projects")?
        .set_default("system.storage.purge_artifacts", false)?
        .set_default("jobs.timeout_secs", 3600)
}
