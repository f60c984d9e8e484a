//! Layered configuration loading

use crate::integration::test_utils::with_config_env;
use cdt_project::config::{global_config_path, ConfigLoader, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn write_workspace_file(workspace: &Path, name: &str, body: &str) {
    let dir = workspace.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config = with_config_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());

    assert_eq!(config.jobs.timeout(), Some(Duration::from_secs(3600)));
    assert_eq!(config.jobs.detector_command, None);
    assert_eq!(
        config.system.storage.projects_dir(workspace.path()),
        workspace.path().join(".cdt/projects")
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_global_file_is_read_from_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config = with_config_env(&test_dir, &[], || {
        let path = global_config_path().unwrap();
        assert_eq!(path, test_dir.path().join("xdg").join("cdt").join("config.toml"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[jobs]\ndetector_command = \"cdt-detect\"\ntimeout_secs = 120\n").unwrap();
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.jobs.detector_command.as_deref(), Some("cdt-detect"));
    assert_eq!(config.jobs.timeout_secs, Some(120));
}

#[test]
fn test_workspace_files_override_global() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_file(workspace.path(), "config.toml", "[jobs]\ntimeout_secs = 300\n");
    write_workspace_file(
        workspace.path(),
        "field.toml",
        "[system.storage]\nprojects_path = \"/srv/cdt/projects\"\npurge_artifacts = true\n",
    );

    let config = with_config_env(&test_dir, &[("CDT_ENV", "field")], || {
        let path = global_config_path().unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[jobs]\ntimeout_secs = 120\n").unwrap();
        ConfigLoader::load(workspace.path()).unwrap()
    });

    assert_eq!(config.jobs.timeout_secs, Some(300));
    assert_eq!(config.system.storage.projects_path, PathBuf::from("/srv/cdt/projects"));
    assert_eq!(
        config.system.storage.projects_dir(workspace.path()),
        PathBuf::from("/srv/cdt/projects")
    );
    assert!(config.system.storage.purge_artifacts);
}

#[test]
fn test_other_environment_file_is_ignored() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_file(workspace.path(), "production.toml", "[jobs]\ntimeout_secs = 5\n");

    let config = with_config_env(&test_dir, &[("CDT_ENV", "development")], || {
        ConfigLoader::load(workspace.path()).unwrap()
    });
    assert_eq!(config.jobs.timeout_secs, Some(3600));
}

#[test]
fn test_environment_variables_override_files() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_file(workspace.path(), "config.toml", "[jobs]\ntimeout_secs = 300\n");

    let config = with_config_env(
        &test_dir,
        &[
            ("CDT__JOBS__TIMEOUT_SECS", "45"),
            ("CDT__LOGGING__LEVEL", "debug"),
        ],
        || ConfigLoader::load(workspace.path()).unwrap(),
    );
    assert_eq!(config.jobs.timeout(), Some(Duration::from_secs(45)));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_values_fail_validation() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_file(
        workspace.path(),
        "config.toml",
        "[jobs]\ntimeout_secs = 0\ndetector_command = \"  \"\n\n[logging]\nformat = \"yaml\"\n",
    );

    let config = with_config_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors.iter().filter(|e| matches!(e, ValidationError::Jobs(_))).count(), 2);
    assert!(errors.iter().any(|e| matches!(e, ValidationError::Logging(_))));
}

#[test]
fn test_written_config_loads_back_unchanged() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let mut expected = with_config_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());
    expected.jobs.detector_command = Some("cdt-detect".into());
    expected.jobs.detector_args = vec!["--fast".into()];
    expected.system.storage.purge_artifacts = true;
    expected.logging.level = "info".into();
    write_workspace_file(workspace.path(), "config.toml", &toml::to_string(&expected).unwrap());

    let loaded = with_config_env(&test_dir, &[], || ConfigLoader::load(workspace.path()).unwrap());
    assert_eq!(loaded, expected);
}
