//! Execution plans
//!
//! A plan is the scheduler's input: layers of blueprint ids, already in
//! dependency order, plus the blueprints themselves. Plans are checked at
//! ingestion so the scheduler can trust the layering.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Blueprint;
use crate::error::{Error, Result};

/// Layers of ready blueprint ids plus the blueprints they name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Session identifier used in evidence paths
    #[serde(default = "new_session_id")]
    pub session_id: String,
    /// Layer k runs entirely before layer k+1
    pub layers: Vec<Vec<String>>,
    /// Every blueprint referenced by the layers
    pub blueprints: Vec<Blueprint>,
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

impl ExecutionPlan {
    pub fn new(layers: Vec<Vec<String>>, blueprints: Vec<Blueprint>) -> Self {
        Self {
            session_id: new_session_id(),
            layers,
            blueprints,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Parse a plan from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load and validate a plan file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let plan = Self::from_json(&contents)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn blueprint(&self, id: &str) -> Option<&Blueprint> {
        self.blueprints.iter().find(|b| b.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Check the plan before anything runs
    ///
    /// Rules:
    /// - Blueprint ids are unique and non-empty
    /// - Every layer entry and every dependency names a known blueprint
    /// - Every blueprint appears in exactly one layer
    /// - No dependency cycles (self-dependency included)
    /// - Every dependency sits in a strictly earlier layer
    pub fn validate(&self) -> Result<()> {
        let mut by_id: HashMap<&str, &Blueprint> = HashMap::new();
        for bp in &self.blueprints {
            if bp.id.trim().is_empty() {
                return Err(Error::InvalidPlan("blueprint id cannot be empty".to_string()));
            }
            if by_id.insert(bp.id.as_str(), bp).is_some() {
                return Err(Error::InvalidPlan(format!("duplicate blueprint id '{}'", bp.id)));
            }
        }

        let mut layer_of: HashMap<&str, usize> = HashMap::new();
        for (index, layer) in self.layers.iter().enumerate() {
            for id in layer {
                if !by_id.contains_key(id.as_str()) {
                    return Err(Error::BlueprintNotFound(id.clone()));
                }
                if layer_of.insert(id.as_str(), index).is_some() {
                    return Err(Error::InvalidPlan(format!(
                        "blueprint '{}' is scheduled more than once",
                        id
                    )));
                }
            }
        }

        for bp in &self.blueprints {
            if !layer_of.contains_key(bp.id.as_str()) {
                return Err(Error::InvalidPlan(format!(
                    "blueprint '{}' is not scheduled in any layer",
                    bp.id
                )));
            }
            for dep in &bp.depends_on {
                if !by_id.contains_key(dep.as_str()) {
                    return Err(Error::InvalidPlan(format!(
                        "blueprint '{}' depends on unknown blueprint '{}'",
                        bp.id, dep
                    )));
                }
            }
        }

        if let Some(cycle) = find_cycle(&self.blueprints) {
            return Err(Error::DependencyCycle(cycle.join(" -> ")));
        }

        for bp in &self.blueprints {
            let own = layer_of[bp.id.as_str()];
            for dep in &bp.depends_on {
                let dep_layer = layer_of[dep.as_str()];
                if dep_layer >= own {
                    return Err(Error::InvalidPlan(format!(
                        "'{}' (layer {}) depends on '{}' (layer {}), which is not earlier",
                        bp.id, own, dep, dep_layer
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Depth-first search for a dependency cycle; returns the cycle path
fn find_cycle(blueprints: &[Blueprint]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        deps: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|s| *s == id).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(id, Mark::Visiting);
        stack.push(id);
        for dep in deps.get(id).copied().unwrap_or_default() {
            if let Some(cycle) = visit(dep.as_str(), deps, marks, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let deps: HashMap<&str, &[String]> = blueprints
        .iter()
        .map(|b| (b.id.as_str(), b.depends_on.as_slice()))
        .collect();
    let mut marks = HashMap::new();
    let mut stack = Vec::new();

    blueprints
        .iter()
        .find_map(|bp| visit(bp.id.as_str(), &deps, &mut marks, &mut stack))
}
