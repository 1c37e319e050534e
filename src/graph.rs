//! The dependency graph over components (spec §3, §4.4).
//!
//! Built with `petgraph`, the same crate `cargo-unleash`'s
//! `commands/to_release.rs` uses to compute a workspace's publish order via
//! `petgraph::Graph` + `petgraph::algo::toposort`. That function's shape —
//! build a graph of the selected packages, add an edge per declared
//! dependency, toposort, then reverse to get a dependency-first order — is
//! exactly spec §4.4's "topological order (required edges only)", so the
//! reversal idiom is kept here too.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::component::Component;
use crate::error::{NexusError, NexusResult};
use crate::version::Constraint;

#[derive(Debug, Clone)]
struct EdgeLabel {
    constraint: Constraint,
    optional: bool,
}

/// A directed graph over components, labeled edges carrying the declaring
/// component's constraint on the target (spec §3).
pub struct DependencyGraph {
    graph: DiGraph<String, EdgeLabel>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Traverses `root`'s declared dependencies (and theirs, transitively)
    /// against the `available` universe of components, building the graph of
    /// everything reachable. Dependency targets absent from `available`
    /// still get a node (so cycle/toposort/export queries don't need to
    /// special-case dangling edges) but aren't expanded further.
    pub fn build(root: &Component, available: &[Component]) -> DependencyGraph {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let by_id: HashMap<&str, &Component> = available.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut queue = vec![root.id.clone()];
        let mut seen = HashSet::new();
        Self::node_index(&mut graph, &mut index, &root.id);

        while let Some(current_id) = queue.pop() {
            if !seen.insert(current_id.clone()) {
                continue;
            }
            let current = if current_id == root.id { Some(root) } else { by_id.get(current_id.as_str()).copied() };
            let current = match current {
                Some(c) => c,
                None => continue,
            };

            let from = Self::node_index(&mut graph, &mut index, &current_id);
            for dep in &current.dependencies {
                let to = Self::node_index(&mut graph, &mut index, &dep.target_id);
                graph.add_edge(
                    from,
                    to,
                    EdgeLabel { constraint: dep.constraint.clone(), optional: dep.optional },
                );
                if !seen.contains(&dep.target_id) {
                    queue.push(dep.target_id.clone());
                }
            }
        }

        DependencyGraph { graph, index }
    }

    fn node_index(
        graph: &mut DiGraph<String, EdgeLabel>,
        index: &mut HashMap<String, NodeIndex>,
        id: &str,
    ) -> NodeIndex {
        if let Some(idx) = index.get(id) {
            return *idx;
        }
        let idx = graph.add_node(id.to_owned());
        index.insert(id.to_owned(), idx);
        idx
    }

    /// Topological order over required edges only, dependencies before
    /// dependents (a dependency-first build order). Optional-only cycles are
    /// permitted (spec §3) and never considered here.
    pub fn topological_order(&self) -> NexusResult<Vec<String>> {
        let required = self.graph.filter_map(
            |_, node| Some(node.clone()),
            |_, edge| if edge.optional { None } else { Some(()) },
        );
        let order = toposort(&required, None).map_err(|cycle| {
            let id = required.node_weight(cycle.node_id()).cloned().unwrap_or_default();
            NexusError::Internal(format!("cycle detected in required dependency graph at `{}`", id))
        })?;
        Ok(order.into_iter().rev().map(|idx| required[idx].clone()).collect())
    }

    /// All simple cycles formed by required edges, each a sequence of
    /// component ids starting and ending at the same node.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut globally_done = HashSet::new();

        for start in self.graph.node_indices() {
            if globally_done.contains(&start) {
                continue;
            }
            self.dfs_cycles(start, &mut path, &mut on_path, &mut globally_done, &mut cycles);
        }
        cycles
    }

    fn dfs_cycles(
        &self,
        node: NodeIndex,
        path: &mut Vec<NodeIndex>,
        on_path: &mut HashSet<NodeIndex>,
        done: &mut HashSet<NodeIndex>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        path.push(node);
        on_path.insert(node);

        for edge in self.graph.edges_directed(node, Direction::Outgoing) {
            if edge.weight().optional {
                continue;
            }
            let next = edge.target();
            if on_path.contains(&next) {
                if let Some(start) = path.iter().position(|&n| n == next) {
                    let mut cycle: Vec<String> = path[start..].iter().map(|&n| self.graph[n].clone()).collect();
                    cycle.push(self.graph[next].clone());
                    cycles.push(cycle);
                }
            } else if !done.contains(&next) {
                self.dfs_cycles(next, path, on_path, done, cycles);
            }
        }

        path.pop();
        on_path.remove(&node);
        done.insert(node);
    }

    /// `true` if `from` declares a dependency edge (required or optional)
    /// directly on `to`.
    pub fn is_direct_dependency(&self, from: &str, to: &str) -> bool {
        self.edge_constraint(from, to).is_some()
    }

    /// The constraint `from` declares on `to`, if a direct edge exists.
    pub fn edge_constraint(&self, from: &str, to: &str) -> Option<Constraint> {
        let from_idx = *self.index.get(from)?;
        let to_idx = *self.index.get(to)?;
        self.graph
            .edges_directed(from_idx, Direction::Outgoing)
            .find(|e| e.target() == to_idx)
            .map(|e| e.weight().constraint.clone())
    }

    pub fn is_reachable(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&from_idx), Some(&to_idx)) => has_path_connecting(&self.graph, from_idx, to_idx, None),
            _ => false,
        }
    }

    /// Renders the graph in the common textual directed-graph form, one node
    /// per component, one edge per declared dependency labeled with its
    /// constraint and an " (optional)" suffix when applicable (spec §4.5,
    /// §6).
    pub fn export_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n");
        for idx in self.graph.node_indices() {
            out.push_str(&format!("    \"{}\";\n", self.graph[idx]));
        }
        for idx in self.graph.node_indices() {
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let label = if edge.weight().optional {
                    format!("{} (optional)", edge.weight().constraint)
                } else {
                    edge.weight().constraint.to_string()
                };
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                    self.graph[idx],
                    self.graph[edge.target()],
                    label
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn comp(id: &str) -> Component {
        Component::new(id, Version::new(1, 0, 0))
    }

    #[test]
    fn required_cycle_is_excluded_from_toposort_but_optional_allowed() {
        let mut a = comp("a");
        let mut b = comp("b");
        a.add_dependency("b", Constraint::Wildcard, false);
        b.add_dependency("a", Constraint::Wildcard, true); // optional back-edge
        let available = vec![a.clone(), b.clone()];
        let graph = DependencyGraph::build(&a, &available);

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
        assert!(graph.detect_cycles().is_empty());
    }

    #[test]
    fn required_cycle_is_detected() {
        let mut a = comp("a");
        let mut b = comp("b");
        a.add_dependency("b", Constraint::Wildcard, false);
        b.add_dependency("a", Constraint::Wildcard, false);
        let available = vec![a.clone(), b.clone()];
        let graph = DependencyGraph::build(&a, &available);

        assert!(graph.topological_order().is_err());
        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn export_dot_labels_optional_edges() {
        let mut a = comp("a");
        a.add_dependency("b", Constraint::parse("^1.0.0").unwrap(), true);
        let available = vec![a.clone(), comp("b")];
        let graph = DependencyGraph::build(&a, &available);
        let dot = graph.export_dot();
        assert!(dot.contains("(optional)"));
    }
}
