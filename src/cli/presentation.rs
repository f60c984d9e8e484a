//! CLI presentation: text and json formatters per command.

use crate::error::ProjectError;
use crate::files::FileKind;
use crate::project::Project;
use crate::types::ProjectId;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde_json::json;
use std::collections::BTreeMap;

fn to_json(value: &serde_json::Value) -> Result<String, ProjectError> {
    serde_json::to_string_pretty(value).map_err(|e| ProjectError::Codec(e.to_string()))
}

fn kind_label(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Raster => "raster",
        FileKind::Shapefile => "shapefile",
        FileKind::Other => "other",
    }
}

pub fn format_project_text(project: &Project) -> String {
    let mut out = format!("Project {} ({})\n\n", project.name(), project.id());
    out.push_str(&project.tree().render());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Layer", "Id", "Name", "Detail"]);
    for image in project.images() {
        table.add_row(vec![
            "image".to_string(),
            image.id().to_string(),
            image.name().to_string(),
            image.path().display().to_string(),
        ]);
        for sub in image.extractions().iter().chain(image.segmentations()) {
            table.add_row(vec![
                format!("  {:?}", sub.kind).to_lowercase(),
                sub.id.to_string(),
                sub.name.clone(),
                format!("{} file(s)", sub.files.len()),
            ]);
        }
    }
    for change in project.changes() {
        let params: Vec<String> = change
            .params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        table.add_row(vec![
            "change".to_string(),
            change.id().to_string(),
            change.name().to_string(),
            format!("{} {}", change.type_tag(), params.join(" ")),
        ]);
    }
    out.push('\n');
    out.push_str(&table.to_string());
    out
}

pub fn format_project_json(project: &Project) -> Result<String, ProjectError> {
    let images: Vec<serde_json::Value> = project
        .images()
        .iter()
        .map(|image| {
            json!({
                "id": image.id().to_string(),
                "name": image.name(),
                "path": image.path().display().to_string(),
                "extractions": image.extractions(),
                "segmentations": image.segmentations(),
            })
        })
        .collect();
    let changes: Vec<serde_json::Value> = project
        .changes()
        .iter()
        .map(|change| {
            let (t1, t2) = change.inputs();
            let params: BTreeMap<&str, String> = change
                .params()
                .iter()
                .map(|(k, v)| (k.as_str(), v.to_string()))
                .collect();
            json!({
                "id": change.id().to_string(),
                "name": change.name(),
                "type": change.type_tag(),
                "image_t1": t1.to_string(),
                "image_t2": t2.to_string(),
                "params": params,
            })
        })
        .collect();
    to_json(&json!({
        "id": project.id().to_string(),
        "name": project.name(),
        "images": images,
        "changes": changes,
        "files": project.files().len(),
    }))
}

pub fn format_files_text(project: &Project) -> String {
    if project.files().is_empty() {
        return "No artifact files tracked.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["File Id", "Kind", "Path", "Auxiliary"]);
    for (id, entry) in project.files().iter() {
        let aux: Vec<String> = entry
            .auxiliary_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        table.add_row(vec![
            id.to_string(),
            kind_label(entry.kind).to_string(),
            entry.primary_path.display().to_string(),
            if aux.is_empty() { "-".to_string() } else { aux.join("\n") },
        ]);
    }
    table.to_string()
}

pub fn format_files_json(project: &Project) -> Result<String, ProjectError> {
    let files: Vec<serde_json::Value> = project
        .files()
        .iter()
        .map(|(id, entry)| {
            json!({
                "id": id.to_string(),
                "kind": kind_label(entry.kind),
                "path": entry.primary_path.display().to_string(),
                "auxiliary": entry
                    .auxiliary_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    to_json(&json!(files))
}

pub fn format_project_list(projects: &[(ProjectId, String)]) -> String {
    if projects.is_empty() {
        return "No projects.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Project Id", "Name"]);
    for (id, name) in projects {
        table.add_row(vec![id.to_string(), name.clone()]);
    }
    table.to_string()
}
