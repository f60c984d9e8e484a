//! Property-based tests: the tree view mirrors the layer collections

use cdt_project::events::EventBus;
use cdt_project::jobs::{DetectionRequest, JobCompletion, JobExecutor, JobHandle, JobTicket};
use cdt_project::layer::params::encode_params;
use cdt_project::layer::{ChangeVariant, ParamMap};
use cdt_project::store::{InMemoryMetadataStore, MetadataStore};
use cdt_project::tree::NodeKind;
use cdt_project::{DetectionInputs, LayerId, Project, ProjectError, ProjectServices};
use proptest::prelude::*;
use std::sync::Arc;

/// Hands back a handle and drops the completer; tests complete jobs by hand
struct ParkedExecutor;

impl JobExecutor for ParkedExecutor {
    fn submit(
        &self,
        variant: &ChangeVariant,
        request: DetectionRequest,
    ) -> Result<JobHandle, ProjectError> {
        let (handle, _completer) = JobHandle::new(JobTicket::for_request(variant.clone(), &request));
        Ok(handle)
    }
}

#[derive(Debug, Clone)]
enum Op {
    AddImage,
    RemoveImage(usize),
    AddChange(usize),
    RemoveChange(usize),
    RemoveAllChanges,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AddImage),
        2 => any::<usize>().prop_map(Op::RemoveImage),
        3 => (0usize..4).prop_map(Op::AddChange),
        2 => any::<usize>().prop_map(Op::RemoveChange),
        1 => Just(Op::RemoveAllChanges),
    ]
}

fn add_change(project: &mut Project, variant_index: usize) {
    if project.images().len() < 2 {
        return;
    }
    let image_t1 = project.images()[0].id();
    let image_t2 = project.images()[1].id();
    let variant = ChangeVariant::builtin()[variant_index].clone();
    let artifacts = variant.artifacts();
    let id = project.id();
    let name = format!("change {}", project.changes().len());
    let handle = project
        .start_change_detection(
            id,
            variant,
            DetectionInputs {
                name,
                image_t1,
                image_t2,
                params: ParamMap::new(),
            },
        )
        .unwrap();
    let mut result = ParamMap::new();
    for key in artifacts {
        result.insert(key.path_key, "/tmp/out.tif".into());
    }
    project
        .on_change_detection_completed(JobCompletion {
            payload: encode_params(&result).unwrap(),
            ticket: handle.ticket().clone(),
        })
        .unwrap();
}

proptest! {
    #[test]
    fn tree_branches_match_collection_order(ops in prop::collection::vec(op(), 0..40)) {
        let store = Arc::new(InMemoryMetadataStore::new());
        let services = ProjectServices::new(store.clone(), Arc::new(ParkedExecutor), EventBus::detached());
        let mut project = Project::create("Survey", services).unwrap();
        let mut added = 0usize;

        for op in ops {
            match op {
                Op::AddImage => {
                    added += 1;
                    project
                        .add_image_layer(format!("image {}", added), format!("/data/{}.tif", added))
                        .unwrap();
                }
                Op::RemoveImage(i) if !project.images().is_empty() => {
                    let id = project.images()[i % project.images().len()].id();
                    prop_assert!(project.remove_image_layer(id).unwrap());
                }
                Op::AddChange(v) => add_change(&mut project, v),
                Op::RemoveChange(i) if !project.changes().is_empty() => {
                    let id = project.changes()[i % project.changes().len()].id();
                    prop_assert!(project.remove_change_layer(id).unwrap());
                }
                Op::RemoveAllChanges => {
                    project.remove_all_change_layers().unwrap();
                }
                _ => {}
            }

            let tree = project.tree();
            let image_nodes: Vec<NodeKind> = tree.images_root().children.iter().map(|n| n.kind).collect();
            let images: Vec<NodeKind> = project.images().iter().map(|l| NodeKind::Image(l.id())).collect();
            prop_assert_eq!(image_nodes, images);

            let change_nodes: Vec<NodeKind> = tree.changes_root().children.iter().map(|n| n.kind).collect();
            let changes: Vec<NodeKind> = project.changes().iter().map(|l| NodeKind::Change(l.id())).collect();
            prop_assert_eq!(change_nodes, changes);

            prop_assert_eq!(store.count_image_layers(project.id()).unwrap(), project.images().len());
            prop_assert_eq!(project.pending_jobs(), 0);
        }
    }

    #[test]
    fn every_change_layer_file_is_registered(variants in prop::collection::vec(0usize..4, 1..8)) {
        let services = ProjectServices::new(
            Arc::new(InMemoryMetadataStore::new()),
            Arc::new(ParkedExecutor),
            EventBus::detached(),
        );
        let mut project = Project::create("Survey", services).unwrap();
        project.add_image_layer("A", "/data/a.tif").unwrap();
        project.add_image_layer("B", "/data/b.tif").unwrap();
        for v in &variants {
            add_change(&mut project, *v);
        }

        prop_assert_eq!(project.files().len(), variants.len());
        let ids: Vec<LayerId> = project.changes().iter().map(|c| c.id()).collect();
        for id in ids {
            let files = project.change(id).unwrap().files();
            prop_assert!(files.iter().all(|f| project.files().contains(f)));
            project.remove_change_layer(id).unwrap();
            prop_assert!(files.iter().all(|f| !project.files().contains(f)));
        }
        prop_assert!(project.files().is_empty());
    }
}
