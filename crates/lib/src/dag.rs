//! Dependency graphs between named nodes (builders within a project, projects within a recipe).
//!
//! Ordering uses Kahn's algorithm with declaration-order tie-breaking, so nodes without a
//! dependency relation keep the order they were declared in.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::ConfigError;

/// Edges point from a dependency to its dependent.
#[derive(Debug, Default, Clone)]
pub struct DependencyDag {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl DependencyDag {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node. Returns `false` if a node with this name already exists.
  pub fn add_node(&mut self, name: &str) -> bool {
    if self.nodes.contains_key(name) {
      return false;
    }
    let idx = self.graph.add_node(name.to_string());
    self.nodes.insert(name.to_string(), idx);
    true
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Record that `dependent` depends on `dependency`. Returns `false` if either is unknown.
  pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> bool {
    match (self.nodes.get(dependency), self.nodes.get(dependent)) {
      (Some(&from), Some(&to)) => {
        self.graph.update_edge(from, to, ());
        true
      }
      _ => false,
    }
  }

  /// All nodes, dependencies first.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::Cycle`] naming the nodes on a cycle.
  pub fn topological_order(&self) -> Result<Vec<String>, ConfigError> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
      .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
      .iter()
      .enumerate()
      .filter(|(_, d)| **d == 0)
      .map(|(i, _)| Reverse(i))
      .collect();

    let mut order = Vec::with_capacity(self.graph.node_count());
    while let Some(Reverse(i)) = ready.pop() {
      let node = NodeIndex::new(i);
      order.push(self.graph[node].clone());
      for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
        let degree = &mut in_degree[next.index()];
        *degree -= 1;
        if *degree == 0 {
          ready.push(Reverse(next.index()));
        }
      }
    }

    if order.len() < self.graph.node_count() {
      return Err(ConfigError::Cycle {
        members: self.cycle_members(),
      });
    }
    Ok(order)
  }

  fn cycle_members(&self) -> Vec<String> {
    let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
      .into_iter()
      .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
      .flatten()
      .collect();
    members.sort();
    members.into_iter().map(|n| self.graph[n].clone()).collect()
  }

  /// Transitive dependencies of `name` in topological order, excluding `name` itself.
  pub fn dependencies_of(&self, name: &str) -> Result<Vec<String>, ConfigError> {
    let Some(&start) = self.nodes.get(name) else {
      return Ok(Vec::new());
    };

    let mut seen: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
      for dep in self.graph.neighbors_directed(node, Direction::Incoming) {
        if seen.insert(dep) {
          stack.push(dep);
        }
      }
    }

    let wanted: HashSet<&str> = seen.iter().map(|n| self.graph[*n].as_str()).collect();
    Ok(
      self
        .topological_order()?
        .into_iter()
        .filter(|n| wanted.contains(n.as_str()) && n != name)
        .collect(),
    )
  }
}
