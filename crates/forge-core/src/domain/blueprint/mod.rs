//! Blueprints: units of build work with declared resources
//!
//! A blueprint is produced upstream and is immutable once handed to the
//! scheduler. The resources it declares are what the lock manager guards.

pub mod plan;

pub use plan::ExecutionPlan;

use serde::{Deserialize, Serialize};

use crate::domain::locking::{LockRequest, ResourceCategory, ResourceId};

/// Kind of work a blueprint performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintType {
    /// Schema, migrations, policies
    Database,
    /// Routes and service functions
    Api,
    /// User-facing components
    Ui,
    /// Wiring between layers
    Integration,
    /// Test suites
    Test,
    /// Anything else
    #[default]
    #[serde(other)]
    Other,
}

impl BlueprintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Api => "api",
            Self::Ui => "ui",
            Self::Integration => "integration",
            Self::Test => "test",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for BlueprintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resources a blueprint declares, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlueprintResources {
    pub tables: Vec<String>,
    pub migrations: Vec<String>,
    pub routes: Vec<String>,
    pub components: Vec<String>,
    pub functions: Vec<String>,
    pub rls_policies: Vec<String>,
    pub types: Vec<String>,
    pub files: Vec<String>,
}

impl BlueprintResources {
    /// Every declared resource as a typed identifier, in declaration order
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        let groups = [
            (ResourceCategory::Table, &self.tables),
            (ResourceCategory::Migration, &self.migrations),
            (ResourceCategory::Route, &self.routes),
            (ResourceCategory::Component, &self.components),
            (ResourceCategory::ServiceFunction, &self.functions),
            (ResourceCategory::RlsPolicy, &self.rls_policies),
            (ResourceCategory::TypeDefinition, &self.types),
            (ResourceCategory::File, &self.files),
        ];

        groups
            .into_iter()
            .flat_map(|(category, names)| {
                names
                    .iter()
                    .map(move |n| ResourceId::new(category, n.clone()))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resource_ids().is_empty()
    }
}

/// A task descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    /// Unique identifier
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    /// Kind of work
    #[serde(rename = "type", default)]
    pub kind: BlueprintType,
    /// Blueprints that must finish first (by id)
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Declared resources
    #[serde(default)]
    pub resources: BlueprintResources,
    /// Specification text handed to the agent and the review oracle
    #[serde(default)]
    pub specifications: String,
    /// Endpoints a UI blueprint calls
    #[serde(default)]
    pub consumes: Vec<String>,
    /// Extra output paths beyond declared files, routes and components
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Blueprint {
    /// Create a blueprint with no resources or dependencies
    pub fn new(id: impl Into<String>, kind: BlueprintType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            depends_on: Vec::new(),
            resources: BlueprintResources::default(),
            specifications: String::new(),
            consumes: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: BlueprintResources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        self.depends_on.push(task_id.into());
        self
    }

    pub fn with_consumes(mut self, endpoints: Vec<String>) -> Self {
        self.consumes = endpoints;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<String>) -> Self {
        self.outputs = outputs;
        self
    }

    /// One write request per declared resource
    ///
    /// There is no read sharing for blueprints yet; every declared resource is
    /// locked exclusively.
    pub fn lock_requests(&self) -> Vec<LockRequest> {
        self.resources
            .resource_ids()
            .into_iter()
            .map(LockRequest::write)
            .collect()
    }

    /// Output paths this blueprint claims: explicit outputs, files, routes
    /// and components, without duplicates
    pub fn output_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let declared = self
            .outputs
            .iter()
            .chain(&self.resources.files)
            .chain(&self.resources.routes)
            .chain(&self.resources.components);
        for path in declared {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::LockMode;

    #[test]
    fn test_blueprint_deserializes_camel_case() {
        let json = r#"{
            "id": "db-orders",
            "name": "Orders schema",
            "type": "database",
            "dependsOn": ["db-users"],
            "resources": {
                "tables": ["orders"],
                "migrations": ["0003_orders"],
                "rlsPolicies": ["orders_owner"]
            },
            "specifications": "Create the orders table"
        }"#;

        let bp: Blueprint = serde_json::from_str(json).unwrap();
        assert_eq!(bp.kind, BlueprintType::Database);
        assert_eq!(bp.depends_on, vec!["db-users"]);
        assert_eq!(bp.resources.rls_policies, vec!["orders_owner"]);
        assert!(bp.resources.routes.is_empty());
        assert!(bp.consumes.is_empty());
    }

    #[test]
    fn test_unknown_type_maps_to_other() {
        let bp: Blueprint = serde_json::from_str(r#"{"id": "x", "type": "docs"}"#).unwrap();
        assert_eq!(bp.kind, BlueprintType::Other);
    }

    #[test]
    fn test_lock_requests_are_all_write() {
        let resources = BlueprintResources {
            routes: vec!["/api/orders".into()],
            functions: vec!["place_order".into()],
            tables: vec!["orders".into()],
            ..Default::default()
        };
        let bp = Blueprint::new("api-orders", BlueprintType::Api).with_resources(resources);

        let requests = bp.lock_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.mode == LockMode::Write));
        let function = ResourceId::new(ResourceCategory::ServiceFunction, "place_order");
        assert!(requests.iter().any(|r| r.resource == function));
    }

    #[test]
    fn test_output_paths_deduplicate() {
        let bp = Blueprint::new("ui", BlueprintType::Ui)
            .with_resources(BlueprintResources {
                components: vec!["OrderList".into()],
                files: vec!["src/orders.tsx".into()],
                ..Default::default()
            })
            .with_outputs(vec!["src/orders.tsx".into(), "src/orders.css".into()]);

        assert_eq!(
            bp.output_paths(),
            vec!["src/orders.tsx", "src/orders.css", "OrderList"]
        );
    }
}
