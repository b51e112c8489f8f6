//! Cross-referencing a batch's results
//!
//! Finds output paths claimed by more than one task, and records how database,
//! API and UI results connect. Links are informational; conflicts are only
//! reported, never acted on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::blueprint::{Blueprint, BlueprintType};

/// An output path claimed by more than one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConflict {
    pub path: String,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// An API summary mentions a table a database task declared
    DatabaseToApi,
    /// A UI task consumes a route an API task declared
    ApiToUi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationLink {
    pub kind: LinkKind,
    pub from: String,
    pub to: String,
    /// The table or route connecting the two
    pub via: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossReferenceReport {
    pub conflicts: Vec<FileConflict>,
    pub links: Vec<IntegrationLink>,
    pub warnings: Vec<String>,
}

impl CrossReferenceReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Cross-reference the results of one batch
///
/// `results` pairs each task that produced a summary with that summary.
pub fn cross_reference(results: &[(&Blueprint, &str)]) -> CrossReferenceReport {
    let mut report = CrossReferenceReport::default();

    let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (blueprint, _) in results {
        for path in blueprint.output_paths() {
            let owners = claims.entry(path).or_default();
            if !owners.contains(&blueprint.id) {
                owners.push(blueprint.id.clone());
            }
        }
    }
    report.conflicts = claims
        .into_iter()
        .filter(|(_, tasks)| tasks.len() > 1)
        .map(|(path, tasks)| FileConflict { path, tasks })
        .collect();

    let of_kind = |kind: BlueprintType| {
        results
            .iter()
            .filter(move |(bp, _)| bp.kind == kind)
            .copied()
    };

    for (db, _) in of_kind(BlueprintType::Database) {
        for table in &db.resources.tables {
            for (api, summary) in of_kind(BlueprintType::Api) {
                if summary.contains(table.as_str()) {
                    report.links.push(IntegrationLink {
                        kind: LinkKind::DatabaseToApi,
                        from: db.id.clone(),
                        to: api.id.clone(),
                        via: table.clone(),
                    });
                }
            }
        }
    }

    for (api, _) in of_kind(BlueprintType::Api) {
        for route in &api.resources.routes {
            for (ui, _) in of_kind(BlueprintType::Ui) {
                if ui.consumes.contains(route) {
                    report.links.push(IntegrationLink {
                        kind: LinkKind::ApiToUi,
                        from: api.id.clone(),
                        to: ui.id.clone(),
                        via: route.clone(),
                    });
                }
            }
        }
    }

    if of_kind(BlueprintType::Api).next().is_some() && of_kind(BlueprintType::Ui).next().is_none() {
        report
            .warnings
            .push("batch has API results but no UI results".to_string());
    }

    report
}
