//! Create/update planning against the portal.
//!
//! Each candidate is looked up on the portal by its identifying paths. A
//! candidate with no existing object is created; otherwise its top-level
//! properties are compared with the existing object and only the differing
//! ones make up the update.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::mapper::Candidate;
use crate::portal::memory::identifier_values;
use crate::portal::{Portal, object_path, root_path};
use crate::schema::SchemaCache;

/// One property that differs from the existing object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDiff {
    pub property: String,
    /// Value in the candidate
    pub value: Value,
    /// Value on the portal; `None` when the property is absent there
    pub existing: Option<Value>,
}

/// What to do with a candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DiffAction {
    Create,
    Update {
        /// Path the existing object was found at
        path: String,
        diffs: Vec<PropertyDiff>,
    },
    #[serde(rename = "noop")]
    NoOp {
        path: String,
    },
}

/// The planned action for one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub row: usize,
    #[serde(flatten)]
    pub action: DiffAction,
}

impl DiffEntry {
    /// Render the property diffs as `prop : old => new` lines
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        match &self.action {
            DiffAction::Create => {
                let _ = write!(out, "{} [{}]: create", self.type_name, self.row);
            }
            DiffAction::NoOp { path } => {
                let _ = write!(out, "{} [{}]: no change to {path}", self.type_name, self.row);
            }
            DiffAction::Update { path, diffs } => {
                let _ = write!(out, "{} [{}]: update {path}", self.type_name, self.row);
                for diff in diffs {
                    let existing = diff.existing.as_ref().map_or_else(|| "(missing)".to_string(), render);
                    let _ = write!(out, "\n  {} : {existing} => {}", diff.property, render(&diff.value));
                }
            }
        }
        out
    }

    /// Patch body for an update: the differing properties with their new values
    #[must_use]
    pub fn patch_body(&self) -> Option<Map<String, Value>> {
        match &self.action {
            DiffAction::Update { diffs, .. } => Some(
                diffs
                    .iter()
                    .map(|diff| (diff.property.clone(), diff.value.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Planned actions for a whole data set, in data set order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffPlan {
    pub entries: Vec<DiffEntry>,
}

impl DiffPlan {
    #[must_use]
    pub fn creates(&self) -> usize {
        self.count(|action| matches!(action, DiffAction::Create))
    }

    #[must_use]
    pub fn updates(&self) -> usize {
        self.count(|action| matches!(action, DiffAction::Update { .. }))
    }

    #[must_use]
    pub fn noops(&self) -> usize {
        self.count(|action| matches!(action, DiffAction::NoOp { .. }))
    }

    fn count(&self, predicate: impl Fn(&DiffAction) -> bool) -> usize {
        self.entries.iter().filter(|entry| predicate(&entry.action)).count()
    }

    /// Entries of one type
    pub fn for_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a DiffEntry> {
        self.entries.iter().filter(move |entry| entry.type_name == type_name)
    }
}

/// Paths an object can be found at: `/{uuid}` first, then
/// `/{Type}/{value}` for every identifying value
#[must_use]
pub fn identifying_paths(type_name: &str, object: &Map<String, Value>, identifying: &[String]) -> Vec<String> {
    let mut paths = Vec::new();
    if let Some(uuid) = object.get("uuid").and_then(Value::as_str) {
        paths.push(root_path(uuid));
    }
    for property in identifying {
        if property == "uuid" {
            continue;
        }
        for value in identifier_values(object.get(property)) {
            let path = object_path(type_name, &value);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Compare two values: numbers numerically, arrays ignoring element order
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= f64::EPSILON * x.abs().max(y.abs()).max(1.0),
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            let mut unmatched: Vec<&Value> = ys.iter().collect();
            xs.iter().all(|x| match unmatched.iter().position(|y| values_equal(x, y)) {
                Some(index) => {
                    unmatched.swap_remove(index);
                    true
                }
                None => false,
            })
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Plans actions by looking candidates up on a portal
pub struct DiffPlanner<'p> {
    portal: &'p dyn Portal,
}

impl<'p> DiffPlanner<'p> {
    pub fn new(portal: &'p dyn Portal) -> Self {
        Self { portal }
    }

    /// The existing portal object for a candidate and the path it was found at
    pub fn find_existing(
        &self,
        type_name: &str,
        candidate: &Candidate,
        identifying: &[String],
    ) -> Result<Option<(String, Value)>> {
        for path in identifying_paths(type_name, &candidate.data, identifying) {
            if let Some(existing) = self.portal.get_metadata(&path)? {
                return Ok(Some((path, existing)));
            }
        }
        Ok(None)
    }

    /// Decide the action for one candidate
    pub fn plan_candidate(&self, type_name: &str, candidate: &Candidate, identifying: &[String]) -> Result<DiffEntry> {
        let action = match self.find_existing(type_name, candidate, identifying)? {
            None => DiffAction::Create,
            Some((path, existing)) => {
                let diffs = compare(&candidate.data, &existing);
                if diffs.is_empty() {
                    DiffAction::NoOp { path }
                } else {
                    DiffAction::Update { path, diffs }
                }
            }
        };
        Ok(DiffEntry {
            type_name: type_name.to_string(),
            row: candidate.row,
            action,
        })
    }

    /// Plan every candidate of a data set
    pub fn plan(&self, data: &IndexMap<String, Vec<Candidate>>, schemas: &mut SchemaCache<'_>) -> Result<DiffPlan> {
        let mut plan = DiffPlan::default();
        for (type_name, candidates) in data {
            let identifying = schemas.identifying_properties(type_name)?;
            for candidate in candidates {
                plan.entries.push(self.plan_candidate(type_name, candidate, &identifying)?);
            }
        }
        log::info!(
            "Plan: {} to create, {} to update, {} unchanged",
            plan.creates(),
            plan.updates(),
            plan.noops()
        );
        Ok(plan)
    }
}

/// Top-level properties of `candidate` that are missing from or differ in `existing`
fn compare(candidate: &Map<String, Value>, existing: &Value) -> Vec<PropertyDiff> {
    candidate
        .iter()
        .filter_map(|(property, value)| {
            let current = existing.get(property);
            if current.is_some_and(|current| values_equal(value, current)) {
                return None;
            }
            Some(PropertyDiff {
                property: property.clone(),
                value: value.clone(),
                existing: current.cloned(),
            })
        })
        .collect()
}
