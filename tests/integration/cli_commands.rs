//! End-to-end command routing against a temporary workspace

use cdt_project::cli::{Cli, RunContext};
use cdt_project::{ProjectError, ProjectId};
use clap::Parser;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, jobs: &str) -> std::path::PathBuf {
    let path = dir.join("cdt.toml");
    std::fs::write(&path, format!("[jobs]\ntimeout_secs = 30\n{}", jobs)).unwrap();
    path
}

fn run(ctx: &RunContext, args: &[&str]) -> Result<String, ProjectError> {
    let mut argv = vec!["cdt"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    ctx.execute(&cli.command)
}

fn project_with_two_images(ctx: &RunContext) -> (String, String, String) {
    let id = run(ctx, &["new", "Delta survey"]).unwrap();
    let a = run(ctx, &["add-image", &id, "--name", "A", "--path", "/data/a.tif"]).unwrap();
    let b = run(ctx, &["add-image", &id, "--name", "B", "--path", "/data/b.tif"]).unwrap();
    (id, a, b)
}

#[test]
fn test_project_file_written_per_command() {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(dir.path().to_path_buf(), Some(write_config(dir.path(), ""))).unwrap();
    let (id, _, _) = project_with_two_images(&ctx);

    assert!(ctx.projects_dir().join(format!("{}.cdtp", id)).exists());
    run(&ctx, &["rename", &id, "Delta 2021"]).unwrap();
    let listed = run(&ctx, &["list"]).unwrap();
    assert!(listed.contains("Delta 2021"));
    assert!(listed.contains(&id));

    let shown = run(&ctx, &["show", &id]).unwrap();
    assert!(shown.contains("Images"));
    assert!(shown.contains("/data/b.tif"));
}

#[test]
fn test_remove_image_all() {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(dir.path().to_path_buf(), Some(write_config(dir.path(), ""))).unwrap();
    let (id, a, _) = project_with_two_images(&ctx);

    let message = run(&ctx, &["remove-image", &id, &a]).unwrap();
    assert!(message.starts_with("Removed layer"));
    assert_eq!(run(&ctx, &["remove-image", &id, "--all"]).unwrap(), "Removed 1 image layer(s)");

    let shown = run(&ctx, &["show", &id, "--format", "json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&shown).unwrap();
    assert_eq!(value["images"].as_array().unwrap().len(), 0);
}

#[test]
fn test_remove_without_id_or_all_is_rejected_by_parser() {
    let project = ProjectId::new().to_string();
    assert!(Cli::try_parse_from(["cdt", "remove-change", project.as_str()]).is_err());
    assert!(Cli::try_parse_from(["cdt", "remove-change", project.as_str(), "--all"]).is_ok());
}

#[test]
fn test_detect_needs_two_images() {
    let dir = TempDir::new().unwrap();
    let ctx = RunContext::new(
        dir.path().to_path_buf(),
        Some(write_config(dir.path(), "detector_command = \"true\"\n")),
    )
    .unwrap();
    let id = run(&ctx, &["new", "Survey"]).unwrap();
    let a = run(&ctx, &["add-image", &id, "--name", "A", "--path", "/data/a.tif"]).unwrap();

    let err = run(&ctx, &["detect", &id, "--t1", &a, "--t2", &a, "--name", "d"]).unwrap_err();
    assert!(matches!(err, ProjectError::Precondition { image_count: 1, .. }));
}

#[cfg(unix)]
#[test]
fn test_detect_files_and_remove_change() {
    let dir = TempDir::new().unwrap();
    let diff = dir.path().join("d.tif");
    let jobs = format!(
        "detector_command = \"sh\"\ndetector_args = [\"-c\", \"echo diffPath={} && echo changed=1834\", \"detector\"]\n",
        diff.display()
    );
    let ctx = RunContext::new(dir.path().to_path_buf(), Some(write_config(dir.path(), &jobs))).unwrap();
    let (id, a, b) = project_with_two_images(&ctx);

    let layer = run(
        &ctx,
        &["detect", &id, "--t1", &a, "--t2", &b, "--name", "2019-2021", "--param", "threshold=0.3"],
    )
    .unwrap();

    let files: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["files", &id, "--format", "json"]).unwrap()).unwrap();
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"], diff.display().to_string());
    assert_eq!(files[0]["kind"], "raster");

    let shown: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["show", &id, "--format", "json"]).unwrap()).unwrap();
    let change = &shown["changes"][0];
    assert_eq!(change["id"], layer);
    assert_eq!(change["params"]["changed"], "1834");
    assert_eq!(change["params"]["diffImageID"], files[0]["id"]);

    run(&ctx, &["remove-change", &id, &layer]).unwrap();
    assert_eq!(run(&ctx, &["files", &id]).unwrap(), "No artifact files tracked.");
}

#[cfg(unix)]
#[test]
fn test_failing_detector_leaves_project_unchanged() {
    let dir = TempDir::new().unwrap();
    let jobs = "detector_command = \"sh\"\ndetector_args = [\"-c\", \"echo no overlap >&2; exit 3\", \"detector\"]\n";
    let ctx = RunContext::new(dir.path().to_path_buf(), Some(write_config(dir.path(), jobs))).unwrap();
    let (id, a, b) = project_with_two_images(&ctx);

    let err = run(&ctx, &["detect", &id, "--t1", &a, "--t2", &b, "--name", "d"]).unwrap_err();
    match err {
        ProjectError::JobFailed { reason, .. } => assert!(reason.contains("no overlap")),
        other => panic!("unexpected error: {other}"),
    }
    let shown: serde_json::Value =
        serde_json::from_str(&run(&ctx, &["show", &id, "--format", "json"]).unwrap()).unwrap();
    assert!(shown["changes"].as_array().unwrap().is_empty());
}
