//! Target dependency graph.
//!
//! Nodes are keyed by fully-qualified target name and carry a payload.
//! Edges point from a dependency to its dependent, so a topological order
//! lists every dependency before the targets that need it. Insertion order
//! is remembered everywhere, which keeps every query deterministic.
//!
//! The graph refuses edges that would close a cycle, so a graph assembled
//! only through [`DependencyGraph::add_edge`] is always acyclic.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum GraphError {
    /// The named node has not been added.
    #[error("node {id} does not exist")]
    #[diagnostic(code(kiln::graph::unknown_node))]
    UnknownNode {
        /// Requested node.
        id: String,
    },
    /// Inserting the edge would close a cycle.
    #[error("adding edge {from} -> {to} would create a cycle")]
    #[diagnostic(code(kiln::graph::cycle))]
    Cycle {
        /// Dependency end of the rejected edge.
        from: String,
        /// Dependent end of the rejected edge.
        to: String,
    },
    /// Ordering could not place every node.
    #[error("dependency graph contains a cycle involving: {}", nodes.join(", "))]
    #[diagnostic(code(kiln::graph::cycle_detected))]
    CycleDetected {
        /// Nodes left unordered.
        nodes: Vec<String>,
    },
}

/// A directed acyclic graph of named nodes.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T> {
    nodes: IndexMap<String, T>,
    edges: IndexMap<String, IndexSet<String>>,
    reverse_edges: IndexMap<String, IndexSet<String>>,
}

impl<T> Default for DependencyGraph<T> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            reverse_edges: IndexMap::new(),
        }
    }
}

impl<T> DependencyGraph<T> {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`, or replace its payload while keeping its edges.
    pub fn add_node(&mut self, id: impl Into<String>, payload: T) {
        let id = id.into();
        self.edges.entry(id.clone()).or_default();
        self.reverse_edges.entry(id.clone()).or_default();
        self.nodes.insert(id, payload);
    }

    /// Record that `to` depends on `from`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if either endpoint is missing and
    /// [`GraphError::Cycle`] if `from == to` or `to` already reaches
    /// `from`. A rejected edge leaves the graph unchanged.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.require(from)?;
        self.require(to)?;
        if self.is_reachable(to, from) {
            return Err(GraphError::Cycle {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }
        if let Some(out) = self.edges.get_mut(from) {
            out.insert(to.to_owned());
        }
        if let Some(incoming) = self.reverse_edges.get_mut(to) {
            incoming.insert(from.to_owned());
        }
        Ok(())
    }

    fn require(&self, id: &str) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode { id: id.to_owned() })
        }
    }

    fn is_reachable(&self, start: &str, end: &str) -> bool {
        let mut visited = IndexSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if current == end {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = self.edges.get(current) {
                queue.extend(next.iter().map(String::as_str));
            }
        }
        false
    }

    /// Direct dependencies of `id`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if `id` is missing.
    pub fn dependencies(&self, id: &str) -> Result<&IndexSet<String>, GraphError> {
        self.reverse_edges
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_owned() })
    }

    /// Direct dependents of `id`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if `id` is missing.
    pub fn dependents(&self, id: &str) -> Result<&IndexSet<String>, GraphError> {
        self.edges
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_owned() })
    }

    /// Payload stored for `id`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if `id` is missing.
    pub fn payload(&self, id: &str) -> Result<&T, GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_owned() })
    }

    /// Whether `id` is a node.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Order every node so that dependencies come first (Kahn's algorithm).
    ///
    /// Ties are broken by insertion order.
    ///
    /// # Errors
    ///
    /// [`GraphError::CycleDetected`] if some nodes cannot be placed.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: IndexMap<&str, usize> = self
            .nodes
            .keys()
            .map(|id| {
                let degree = self.reverse_edges.get(id).map_or(0, IndexSet::len);
                (id.as_str(), degree)
            })
            .collect();
        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current.to_owned());
            let Some(dependents) = self.edges.get(current) else {
                continue;
            };
            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let nodes = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.to_owned())
                .collect();
            Err(GraphError::CycleDetected { nodes })
        }
    }

    /// Whether ordering fails.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        self.topological_sort().is_err()
    }

    /// `id` and everything it transitively depends on.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if `id` is missing.
    pub fn dependency_closure(&self, id: &str) -> Result<IndexSet<String>, GraphError> {
        self.require(id)?;
        let mut closure = IndexSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !closure.insert(current.to_owned()) {
                continue;
            }
            if let Some(deps) = self.reverse_edges.get(current) {
                stack.extend(
                    deps.iter()
                        .rev()
                        .filter(|dep| !closure.contains(*dep))
                        .map(String::as_str),
                );
            }
        }
        Ok(closure)
    }

    /// Every simple path from `start` to `end` along dependency edges.
    ///
    /// A path starts at `start` and ends at `end`; `start == end` yields the
    /// single one-node path.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if either endpoint is missing.
    pub fn find_all_paths(&self, start: &str, end: &str) -> Result<Vec<Vec<String>>, GraphError> {
        self.require(start)?;
        self.require(end)?;

        let mut paths = Vec::new();
        let mut stack: Vec<Vec<&str>> = vec![vec![start]];
        while let Some(path) = stack.pop() {
            let Some(&current) = path.last() else {
                continue;
            };
            if current == end {
                paths.push(path.iter().map(|id| (*id).to_owned()).collect());
                continue;
            }
            let Some(next) = self.edges.get(current) else {
                continue;
            };
            for neighbour in next.iter().rev() {
                if path.contains(&neighbour.as_str()) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(neighbour);
                stack.push(extended);
            }
        }
        Ok(paths)
    }

    /// Render the graph as Graphviz DOT text.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n    rankdir=LR;\n");
        for id in self.nodes.keys() {
            out.push_str(&format!("    {};\n", quote(id)));
        }
        for (from, targets) in &self.edges {
            for to in targets {
                out.push_str(&format!("    {} -> {};\n", quote(from), quote(to)));
            }
        }
        out.push_str("}\n");
        out
    }
}

fn quote(id: &str) -> String {
    format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests;
