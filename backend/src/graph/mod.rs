//! Component Dependency Graph
//!
//! Nodes are components; an edge `from -> to` means `to` reads the
//! same-day output of `from`.
//!
//! # Critical Invariants
//!
//! 1. **Acyclic**: an edge that would close a cycle is rejected and the
//!    graph is left unchanged.
//! 2. **Deterministic Order**: the execution order is Kahn's topological
//!    sort with ready nodes kept in a `BTreeSet`, so ties are broken by
//!    lexical component id and insertion order never matters.
//! 3. **Atomic Edits**: `mutate` builds the edited graph on a copy and
//!    swaps it in only when every step succeeded.

mod plan;

pub use plan::ExecutionPlan;

use crate::components::{Component, ComponentId};
use crate::core::error::{GraphError, SimulationError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Directed acyclic graph of components
#[derive(Clone, Default)]
pub struct DependencyGraph {
    /// Component id → component
    nodes: BTreeMap<ComponentId, Arc<dyn Component>>,

    /// Component id → ids that read it
    dependents: BTreeMap<ComponentId, BTreeSet<ComponentId>>,

    /// Component id → ids it reads
    dependencies: BTreeMap<ComponentId, BTreeSet<ComponentId>>,

    /// Cached topological order, cleared by every structural edit
    cached_order: Option<Arc<Vec<ComponentId>>>,
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("dependents", &self.dependents)
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from components and their declared dependencies
    ///
    /// Declared dependencies on components that are not present (disabled
    /// in configuration) are dropped.
    pub fn from_components(components: &[Arc<dyn Component>]) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for component in components {
            graph.register(Arc::clone(component))?;
        }
        graph.connect_declared()?;
        Ok(graph)
    }

    /// Add edges for every declared dependency whose endpoints both exist
    fn connect_declared(&mut self) -> Result<(), GraphError> {
        let declared: Vec<(ComponentId, ComponentId)> = self
            .nodes
            .iter()
            .flat_map(|(id, component)| {
                component
                    .dependencies()
                    .into_iter()
                    .map(move |dep| (dep, id.clone()))
            })
            .filter(|(dep, _)| self.nodes.contains_key(dep))
            .collect();

        for (from, to) in declared {
            self.add_edge(&from, &to)?;
        }
        Ok(())
    }

    // ========================================================================
    // Structural Edits
    // ========================================================================

    /// Register a component node
    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<(), GraphError> {
        let id = component.id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateComponent(id));
        }
        self.nodes.insert(id.clone(), component);
        self.dependents.entry(id.clone()).or_default();
        self.dependencies.entry(id).or_default();
        self.cached_order = None;
        Ok(())
    }

    /// Declare that `to` reads `from`'s output
    ///
    /// Checks whether `from` is reachable from `to` before inserting, so
    /// each insertion costs one traversal of the affected subgraph rather
    /// than a full re-sort.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownComponent(id.to_string()));
            }
        }
        if from == to || self.reaches(to, from) {
            return Err(GraphError::Cycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let inserted = self
            .dependents
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.dependencies
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
        if inserted {
            self.cached_order = None;
        }
        Ok(())
    }

    /// Add and remove components as one atomic edit
    ///
    /// Removed components take their edges with them. Added components are
    /// connected to present nodes by their declared dependencies, and
    /// present nodes that declare a dependency on an added component gain
    /// that edge. On error the graph is unchanged.
    pub fn mutate(
        &mut self,
        add: Vec<Arc<dyn Component>>,
        remove: &[&str],
    ) -> Result<(), GraphError> {
        let mut next = self.clone();
        for id in remove {
            next.remove(id)?;
        }
        for component in add {
            next.register(component)?;
        }
        next.connect_declared()?;
        next.cached_order = None;
        *self = next;
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<(), GraphError> {
        if self.nodes.remove(id).is_none() {
            return Err(GraphError::UnknownComponent(id.to_string()));
        }
        if let Some(outgoing) = self.dependents.remove(id) {
            for to in outgoing {
                if let Some(deps) = self.dependencies.get_mut(&to) {
                    deps.remove(id);
                }
            }
        }
        if let Some(incoming) = self.dependencies.remove(id) {
            for from in incoming {
                if let Some(deps) = self.dependents.get_mut(&from) {
                    deps.remove(id);
                }
            }
        }
        self.cached_order = None;
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn component(&self, id: &str) -> Option<&Arc<dyn Component>> {
        self.nodes.get(id)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.dependents
            .get(from)
            .map(|set| set.contains(to))
            .unwrap_or(false)
    }

    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(|set| set.len()).sum()
    }

    /// Direct dependencies of a component
    pub fn dependencies_of(&self, id: &str) -> Option<&BTreeSet<ComponentId>> {
        self.dependencies.get(id)
    }

    /// True if a directed path leads from `start` to `target`
    pub fn reaches(&self, start: &str, target: &str) -> bool {
        let mut stack = vec![start];
        let mut seen = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.dependents.get(node) {
                stack.extend(next.iter().map(|s| s.as_str()));
            }
        }
        false
    }

    /// Deterministic topological order (cached until the next edit)
    pub fn resolve_order(&mut self) -> Result<Arc<Vec<ComponentId>>, GraphError> {
        if let Some(order) = &self.cached_order {
            return Ok(Arc::clone(order));
        }
        let order = Arc::new(self.topological_order()?);
        debug!(order = ?order, "resolved component order");
        self.cached_order = Some(Arc::clone(&order));
        Ok(order)
    }

    /// Kahn's algorithm with lexically ordered ready set
    fn topological_order(&self) -> Result<Vec<ComponentId>, GraphError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .keys()
            .map(|id| {
                let degree = self.dependencies.get(id).map(|d| d.len()).unwrap_or(0);
                (id.as_str(), degree)
            })
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id.to_string());
            if let Some(next) = self.dependents.get(id) {
                for to in next {
                    if let Some(degree) = in_degree.get_mut(to.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(to.as_str());
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let remaining = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(GraphError::CyclicGraph { remaining });
        }
        Ok(order)
    }

    /// Resolve the order and freeze it into a shareable plan
    ///
    /// Fails with `UnresolvedConflict` when two components may write the
    /// same category of state and neither reads the other.
    pub fn compile(&mut self) -> Result<Arc<ExecutionPlan>, SimulationError> {
        let order = self.resolve_order()?;
        let plan = ExecutionPlan::new(self, &order);
        plan.check_static_conflicts()?;
        Ok(Arc::new(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::DayContext;
    use crate::core::error::ComponentError;
    use crate::models::delta::{StateDelta, WriteScope};
    use crate::rng::RandomSource;

    #[derive(Debug)]
    struct Node(&'static str, Vec<&'static str>);

    impl Component for Node {
        fn id(&self) -> &str {
            self.0
        }
        fn dependencies(&self) -> Vec<ComponentId> {
            self.1.iter().map(|s| s.to_string()).collect()
        }
        fn writes(&self) -> Vec<WriteScope> {
            Vec::new()
        }
        fn transform(
            &self,
            _ctx: &DayContext<'_>,
            _rng: &mut RandomSource,
        ) -> Result<StateDelta, ComponentError> {
            Ok(StateDelta::new())
        }
    }

    fn node(id: &'static str, deps: Vec<&'static str>) -> Arc<dyn Component> {
        Arc::new(Node(id, deps))
    }

    #[test]
    fn test_reaches_follows_transitive_edges() {
        let graph = DependencyGraph::from_components(&[
            node("a", vec![]),
            node("b", vec!["a"]),
            node("c", vec!["b"]),
        ])
        .unwrap();
        assert!(graph.reaches("a", "c"));
        assert!(!graph.reaches("c", "a"));
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let mut graph = DependencyGraph::from_components(&[node("a", vec![])]).unwrap();
        assert!(matches!(graph.add_edge("a", "a"), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_missing_declared_dependency_is_dropped() {
        let graph = DependencyGraph::from_components(&[node("b", vec!["disabled"])]).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }
}
