//! Layer add/remove lifecycle, tree view and canvas notifications

use crate::integration::test_utils::{changed_count, test_bed, ManualExecutor, RecordingCanvas};
use cdt_project::events::{dispatch_events, ProjectEvent};
use cdt_project::layer::{ParamMap, SubLayerKind};
use cdt_project::tree::NodeKind;
use cdt_project::{DetectionInputs, LayerId, Project, RenderableHandle};
use cdt_project::jobs::JobCompletion;
use cdt_project::layer::params::encode_params;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_remove_all_image_layers_scenario() {
    let bed = test_bed(Arc::new(ManualExecutor::default()));
    let mut project = Project::create("Survey", bed.services.clone()).unwrap();
    project.add_image_layer("A", "/data/a.tif").unwrap();
    project.add_image_layer("B", "/data/b.tif").unwrap();
    bed.events.try_iter().count();

    assert_eq!(project.remove_all_image_layers().unwrap(), 2);

    let events: Vec<ProjectEvent> = bed.events.try_iter().collect();
    assert_eq!(changed_count(&events), 2);
    assert!(project.images().is_empty());
    assert!(project.tree().images_root().children.is_empty());
}

#[test]
fn test_tree_branches_follow_collections() {
    let bed = test_bed(Arc::new(ManualExecutor::default()));
    let mut project = Project::create("Survey", bed.services.clone()).unwrap();
    let ids: Vec<LayerId> = ["A", "B", "C"]
        .iter()
        .map(|n| project.add_image_layer(*n, format!("/data/{}.tif", n)).unwrap().id())
        .collect();
    project.remove_image_layer(ids[1]).unwrap();

    let tree = project.tree();
    let labels: Vec<&str> = tree.images_root().children.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "C"]);
    assert_eq!(tree.parent_of_layer(ids[0]), Some(NodeKind::ImagesRoot));
    assert_eq!(tree.parent_of_layer(ids[1]), None);
    assert_eq!(tree.find_parent(&NodeKind::ImagesRoot), Some(NodeKind::ProjectRoot));
}

#[test]
fn test_canvas_receives_attach_detach_and_single_zoom() {
    let bed = test_bed(Arc::new(ManualExecutor::default()));
    let mut project = Project::create("Survey", bed.services.clone()).unwrap();
    let a = project.add_image_layer("A", "/data/a.tif").unwrap().id();
    let b = project.add_image_layer("B", "/data/b.tif").unwrap().id();
    project.remove_image_layer(a).unwrap();

    let mut canvas = RecordingCanvas::default();
    let changed = dispatch_events(&bed.events, &mut canvas);
    assert_eq!(changed, vec![project.id(); 3]);
    assert_eq!(canvas.zooms, 1);
    assert_eq!(canvas.attached, vec![RenderableHandle::for_layer(b)]);
    assert_eq!(canvas.detached, vec![RenderableHandle::for_layer(a)]);
}

#[test]
fn test_remove_change_layer_releases_files() {
    let executor = Arc::new(ManualExecutor::default());
    let bed = test_bed(executor.clone());
    let mut project = Project::create("Survey", bed.services.clone()).unwrap();
    let a = project.add_image_layer("A", "/data/a.tif").unwrap().id();
    let b = project.add_image_layer("B", "/data/b.tif").unwrap().id();

    let id = project.id();
    let handle = project
        .start_pixel_change_detection_binary(
            id,
            DetectionInputs {
                name: "diff".into(),
                image_t1: a,
                image_t2: b,
                params: ParamMap::new(),
            },
        )
        .unwrap();
    let mut result = ParamMap::new();
    result.insert("diffPath".into(), "/tmp/d.tif".into());
    let ticket = handle.ticket().clone();
    let layer_id = project
        .on_pixel_change_detection_binary_completed(JobCompletion {
            payload: encode_params(&result).unwrap(),
            ticket,
        })
        .unwrap();

    let files = project.change(layer_id).unwrap().files();
    assert_eq!(files.len(), 1);
    assert!(files.iter().all(|f| project.files().contains(f)));

    assert!(project.remove_change_layer(layer_id).unwrap());
    assert!(files.iter().all(|f| !project.files().contains(f)));
    assert_eq!(project.tree().parent_of_layer(layer_id), None);
    assert!(!project.remove_change_layer(layer_id).unwrap());
}

#[test]
fn test_purge_artifacts_deletes_files_on_disk() {
    let dir = TempDir::new().unwrap();
    let seg = dir.path().join("segments.shp");
    std::fs::write(&seg, b"shp").unwrap();
    std::fs::write(dir.path().join("segments.dbf"), b"dbf").unwrap();

    let bed = test_bed(Arc::new(ManualExecutor::default()));
    let services = bed.services.clone().with_purge_artifacts(true);
    let mut project = Project::create("Survey", services).unwrap();
    let a = project.add_image_layer("A", "/data/a.tif").unwrap().id();
    project
        .add_image_sub_layer(a, "segments", SubLayerKind::Segmentation, vec![seg.clone()])
        .unwrap();
    let entry = project.files().iter().next().unwrap().1.clone();
    assert_eq!(entry.auxiliary_paths, vec![dir.path().join("segments.dbf")]);

    project.remove_image_layer(a).unwrap();
    assert!(project.files().is_empty());
    assert!(!seg.exists());
    assert!(!dir.path().join("segments.dbf").exists());
}

#[test]
fn test_files_kept_on_disk_without_purge() {
    let dir = TempDir::new().unwrap();
    let raster = dir.path().join("ndvi.tif");
    std::fs::write(&raster, b"tif").unwrap();

    let bed = test_bed(Arc::new(ManualExecutor::default()));
    let mut project = Project::create("Survey", bed.services.clone()).unwrap();
    let a = project.add_image_layer("A", "/data/a.tif").unwrap().id();
    project
        .add_image_sub_layer(a, "ndvi", SubLayerKind::Extraction, vec![raster.clone()])
        .unwrap();
    project.remove_all_image_layers().unwrap();

    assert!(project.files().is_empty());
    assert!(raster.exists());
}
