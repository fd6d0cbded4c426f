//! Load plan: the dependency graph between content tables.
//!
//! A [`LoadPlan`] is built from [`LoadStep`]s, each naming an entity kind and
//! the kinds it depends on, and is topologically sorted so that every table
//! loads after the tables its foreign keys point at. Ties keep the order the
//! steps were given in.

use std::collections::{HashMap, HashSet};

use crate::error::{MigrateError, Result};
use crate::model::EntityKind;

/// One table load and the tables that must be loaded before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStep {
    pub kind: EntityKind,
    pub depends_on: Vec<EntityKind>,
}

impl LoadStep {
    pub fn new(kind: EntityKind, depends_on: impl Into<Vec<EntityKind>>) -> Self {
        Self {
            kind,
            depends_on: depends_on.into(),
        }
    }

    /// Step whose dependencies are the kind's foreign-key references.
    pub fn for_kind(kind: EntityKind) -> Self {
        Self::new(kind, kind.references())
    }
}

/// Ordered list of table loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    steps: Vec<LoadStep>,
}

impl LoadPlan {
    /// Sort `steps` into a valid load order.
    ///
    /// Fails on duplicate kinds, dependencies on kinds that are not part of
    /// the plan, and cycles.
    pub fn new(steps: Vec<LoadStep>) -> Result<Self> {
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.kind) {
                return Err(MigrateError::Plan(format!(
                    "table {} appears more than once",
                    step.kind
                )));
            }
        }
        for step in &steps {
            if let Some(missing) = step.depends_on.iter().find(|d| !seen.contains(*d)) {
                return Err(MigrateError::Plan(format!(
                    "table {} depends on {}, which is not in the plan",
                    step.kind, missing
                )));
            }
        }

        let mut pending: HashMap<EntityKind, usize> = steps
            .iter()
            .map(|s| (s.kind, s.depends_on.iter().collect::<HashSet<_>>().len()))
            .collect();
        let mut remaining = steps;
        let mut ordered = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let Some(pos) = remaining.iter().position(|s| pending[&s.kind] == 0) else {
                let stuck: Vec<String> = remaining.iter().map(|s| s.kind.to_string()).collect();
                return Err(MigrateError::Plan(format!(
                    "dependency cycle between {}",
                    stuck.join(", ")
                )));
            };

            let step = remaining.remove(pos);
            for other in &remaining {
                if other.depends_on.contains(&step.kind) {
                    if let Some(count) = pending.get_mut(&other.kind) {
                        *count -= 1;
                    }
                }
            }
            ordered.push(step);
        }

        Ok(Self { steps: ordered })
    }

    /// The plan for all five content tables.
    pub fn content() -> Self {
        Self {
            steps: EntityKind::ALL.into_iter().map(LoadStep::for_kind).collect(),
        }
    }

    pub fn steps(&self) -> &[LoadStep] {
        &self.steps
    }

    /// Kinds in load order.
    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.steps.iter().map(|s| s.kind)
    }
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self::content()
    }
}
