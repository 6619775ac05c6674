/// Planning: diff desired containers against recorded state
use std::fmt;

use super::container::{ContainerSpec, ContainerState};
use crate::state::StateFile;

/// What must happen to bring one container in line with its declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    /// Delete then create, for changes that cannot be made in place
    Replace,
    Delete,
    NoOp,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Replace => write!(f, "replace"),
            Action::Delete => write!(f, "delete"),
            Action::NoOp => write!(f, "no-op"),
        }
    }
}

/// A planned action for one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub name: String,
    pub action: Action,
    /// Attributes that differ, for updates and replacements
    pub fields: Vec<&'static str>,
}

/// Plan the actions for every declared and every recorded container
///
/// Declared containers come first, in declaration order; containers only
/// present in state are deleted afterwards.
pub fn plan(desired: &[ContainerSpec], state: &StateFile, default_region: &str) -> Vec<PlannedChange> {
    let mut changes = Vec::new();

    for spec in desired {
        let change = match state.get(&spec.name).filter(|s| s.exists()) {
            None => PlannedChange {
                name: spec.name.clone(),
                action: Action::Create,
                fields: Vec::new(),
            },
            Some(recorded) => diff(spec, recorded, default_region),
        };
        changes.push(change);
    }

    for name in state.names() {
        if !desired.iter().any(|spec| spec.name == name) {
            changes.push(PlannedChange {
                name: name.to_string(),
                action: Action::Delete,
                fields: Vec::new(),
            });
        }
    }

    changes
}

fn diff(spec: &ContainerSpec, recorded: &ContainerState, default_region: &str) -> PlannedChange {
    let prior = &recorded.attributes;

    if spec.region_or(default_region) != prior.region_or(default_region) {
        return PlannedChange {
            name: spec.name.clone(),
            action: Action::Replace,
            fields: vec!["region"],
        };
    }

    let fields = changed_fields(prior, spec);
    PlannedChange {
        name: spec.name.clone(),
        action: if fields.is_empty() {
            Action::NoOp
        } else {
            Action::Update
        },
        fields,
    }
}

/// Names of the in-place updatable attributes that differ
pub fn changed_fields(prior: &ContainerSpec, desired: &ContainerSpec) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if prior.container_read != desired.container_read {
        fields.push("container_read");
    }
    if prior.container_write != desired.container_write {
        fields.push("container_write");
    }
    if prior.container_sync_to != desired.container_sync_to {
        fields.push("container_sync_to");
    }
    if prior.container_sync_key != desired.container_sync_key {
        fields.push("container_sync_key");
    }
    if prior.content_type != desired.content_type {
        fields.push("content_type");
    }
    if prior.versioning != desired.versioning {
        fields.push("versioning");
    }
    if prior.metadata != desired.metadata {
        fields.push("metadata");
    }
    if prior.force_destroy != desired.force_destroy {
        fields.push("force_destroy");
    }
    fields
}
