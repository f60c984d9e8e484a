//! Project stream round-trips and polymorphic reconstruction

use crate::integration::test_utils::{test_bed, ManualExecutor};
use cdt_project::jobs::JobCompletion;
use cdt_project::layer::params::encode_params;
use cdt_project::layer::{
    ArtifactKey, ChangeLayer, ChangeVariant, CustomVariant, ParamMap, SubLayerKind,
};
use cdt_project::{DetectionInputs, LayerTypeRegistry, Project, ProjectError, ProjectFile};
use std::sync::Arc;
use tempfile::TempDir;

fn custom() -> ChangeVariant {
    ChangeVariant::Custom(CustomVariant {
        tag: "SpectralAngleChange".into(),
        label: "Spectral angle change".into(),
        artifacts: vec![ArtifactKey::new("anglePath", "angleImageID")],
    })
}

/// Project with two images, a sub-layer and one change layer per variant
fn populated(executor: Arc<ManualExecutor>, services: cdt_project::ProjectServices) -> Project {
    let mut project = Project::create("Delta survey", services).unwrap();
    let a = project.add_image_layer("A", "/data/a.tif").unwrap().id();
    let b = project.add_image_layer("B", "/data/b.tif").unwrap().id();
    project
        .add_image_sub_layer(a, "segments", SubLayerKind::Segmentation, vec!["/tmp/seg.shp".into()])
        .unwrap();

    let mut variants: Vec<ChangeVariant> = ChangeVariant::builtin().to_vec();
    variants.push(custom());
    let id = project.id();
    for variant in variants {
        let artifacts = variant.artifacts();
        let handle = project
            .start_change_detection(
                id,
                variant,
                DetectionInputs {
                    name: artifacts[0].id_key.clone(),
                    image_t1: a,
                    image_t2: b,
                    params: ParamMap::new(),
                },
            )
            .unwrap();
        let mut result = ParamMap::new();
        for key in &artifacts {
            result.insert(key.path_key.clone(), format!("/tmp/{}.out", key.path_key).into());
        }
        project
            .on_change_detection_completed(JobCompletion {
                payload: encode_params(&result).unwrap(),
                ticket: handle.ticket().clone(),
            })
            .unwrap();
    }
    assert_eq!(executor.submissions(), 5);
    project
}

fn registry_with_custom() -> LayerTypeRegistry {
    let mut registry = LayerTypeRegistry::with_builtin();
    registry.register_variant(custom()).unwrap();
    registry
}

#[test]
fn test_round_trip_law() {
    let executor = Arc::new(ManualExecutor::default());
    let source = test_bed(executor.clone());
    let project = populated(executor, source.services.clone());
    let bytes = project.serialize().unwrap();

    let target = test_bed(Arc::new(ManualExecutor::default()));
    let loaded = Project::deserialize(&bytes, &registry_with_custom(), target.services.clone()).unwrap();

    assert_eq!(loaded.id(), project.id());
    assert_eq!(loaded.name(), project.name());
    assert_eq!(loaded.images(), project.images());
    assert_eq!(loaded.changes(), project.changes());
    assert_eq!(loaded.files(), project.files());
    assert_eq!(loaded.tree(), project.tree());
    let tags: Vec<&str> = loaded.changes().iter().map(ChangeLayer::type_tag).collect();
    assert_eq!(tags.last(), Some(&"SpectralAngleChange"));

    // loading goes through the same persistence path as rename
    assert_eq!(
        target.store.lookup_name(project.id()).unwrap().as_deref(),
        Some("Delta survey")
    );
    assert_eq!(target.store.count_image_layers(project.id()).unwrap(), 2);
    assert!(loaded.is_detection_enabled(loaded.id()).unwrap());
}

#[test]
fn test_round_trip_is_stable() {
    let executor = Arc::new(ManualExecutor::default());
    let source = test_bed(executor.clone());
    let project = populated(executor, source.services.clone());
    let bytes = project.serialize().unwrap();

    let target = test_bed(Arc::new(ManualExecutor::default()));
    let loaded = Project::deserialize(&bytes, &registry_with_custom(), target.services.clone()).unwrap();
    assert_eq!(loaded.serialize().unwrap(), bytes);
}

#[test]
fn test_unregistered_tag_aborts_load() {
    let executor = Arc::new(ManualExecutor::default());
    let source = test_bed(executor.clone());
    let project = populated(executor, source.services.clone());
    let bytes = project.serialize().unwrap();

    let target = test_bed(Arc::new(ManualExecutor::default()));
    let err = Project::deserialize(&bytes, &LayerTypeRegistry::with_builtin(), target.services.clone())
        .unwrap_err();
    assert!(matches!(err, ProjectError::UnknownLayerType(ref tag) if tag == "SpectralAngleChange"));
    assert!(err.is_fatal());
    assert!(target.events.try_recv().is_err());
    assert_eq!(target.store.lookup_name(project.id()).unwrap(), None);
    assert_eq!(target.store.count_image_layers(project.id()).unwrap(), 0);
}

#[test]
fn test_registry_order_does_not_matter() {
    let executor = Arc::new(ManualExecutor::default());
    let source = test_bed(executor.clone());
    let project = populated(executor, source.services.clone());
    let bytes = project.serialize().unwrap();

    let mut reversed = LayerTypeRegistry::new();
    reversed.register_variant(custom()).unwrap();
    for variant in ChangeVariant::builtin().into_iter().rev() {
        reversed.register_variant(variant).unwrap();
    }
    let target = test_bed(Arc::new(ManualExecutor::default()));
    let loaded = Project::deserialize(&bytes, &reversed, target.services.clone()).unwrap();
    assert_eq!(loaded.changes(), project.changes());
}

#[test]
fn test_project_file_save_and_load() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(ManualExecutor::default());
    let source = test_bed(executor.clone());
    let project = populated(executor, source.services.clone());
    let path = ProjectFile::save(dir.path(), &project).unwrap();
    assert_eq!(path, ProjectFile::path_for(dir.path(), project.id()));

    let target = test_bed(Arc::new(ManualExecutor::default()));
    let loaded = ProjectFile::load(&path, &registry_with_custom(), target.services.clone()).unwrap();
    assert_eq!(loaded.changes().len(), 5);
    assert_eq!(loaded.files(), project.files());
}
