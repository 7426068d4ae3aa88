//! Compiled execution plan
//!
//! A frozen, read-only view of a resolved graph, shared by reference across
//! every run that uses the same component configuration.

use crate::components::{Component, ComponentId};
use crate::core::error::SimulationError;
use crate::graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug)]
pub struct ExecutionPlan {
    /// Components in resolution order
    components: Vec<Arc<dyn Component>>,

    /// Component id → position in `components`
    index: BTreeMap<ComponentId, usize>,

    /// Direct dependencies of each position, ascending
    dependencies: Vec<Vec<usize>>,

    /// Transitive dependencies of each position
    ancestors: Vec<BTreeSet<usize>>,

    /// Positions grouped by longest dependency chain; members of one level
    /// share no edges
    levels: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    pub(crate) fn new(graph: &DependencyGraph, order: &[ComponentId]) -> Self {
        let index: BTreeMap<ComponentId, usize> = order
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), pos))
            .collect();

        let components: Vec<Arc<dyn Component>> = order
            .iter()
            .filter_map(|id| graph.component(id).cloned())
            .collect();

        let dependencies: Vec<Vec<usize>> = order
            .iter()
            .map(|id| {
                let mut deps: Vec<usize> = graph
                    .dependencies_of(id)
                    .into_iter()
                    .flatten()
                    .filter_map(|dep| index.get(dep).copied())
                    .collect();
                deps.sort_unstable();
                deps
            })
            .collect();

        // Topological order guarantees every dependency precedes its reader
        let mut ancestors: Vec<BTreeSet<usize>> = Vec::with_capacity(order.len());
        let mut depth: Vec<usize> = Vec::with_capacity(order.len());
        for deps in &dependencies {
            let mut set = BTreeSet::new();
            let mut level = 0;
            for &dep in deps {
                set.insert(dep);
                set.extend(ancestors[dep].iter().copied());
                level = level.max(depth[dep] + 1);
            }
            ancestors.push(set);
            depth.push(level);
        }

        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (pos, &level) in depth.iter().enumerate() {
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(pos);
        }

        Self {
            components,
            index,
            dependencies,
            ancestors,
            levels,
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    /// Component ids in resolution order
    pub fn order(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.id()).collect()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn dependencies(&self, pos: usize) -> &[usize] {
        &self.dependencies[pos]
    }

    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    /// True if one of the two positions transitively reads the other
    pub fn connected(&self, a: usize, b: usize) -> bool {
        a == b || self.ancestors[a].contains(&b) || self.ancestors[b].contains(&a)
    }

    /// Reject pairs that may write the same category without a path
    pub(crate) fn check_static_conflicts(&self) -> Result<(), SimulationError> {
        let scopes: Vec<BTreeSet<_>> = self
            .components
            .iter()
            .map(|c| c.writes().into_iter().collect())
            .collect();

        for first in 0..self.components.len() {
            for second in (first + 1)..self.components.len() {
                if self.connected(first, second) {
                    continue;
                }
                if let Some(scope) = scopes[first].intersection(&scopes[second]).next() {
                    return Err(SimulationError::UnresolvedConflict {
                        field: scope.to_string(),
                        first: self.components[first].id().to_string(),
                        second: self.components[second].id().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
