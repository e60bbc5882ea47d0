//! Task dependency graph.
//!
//! Wraps a petgraph `DiGraph` whose nodes are task identifiers and whose
//! edges point from a predecessor to the task that consumes its output.
//! Node indices follow insertion order, which is the task set's
//! declaration order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::task::{TaskId, TaskSet};
use crate::{Error, Result};

pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
        }
    }

    /// Build the graph for a task set, checking that every predecessor
    /// is declared. Cycles are not rejected here; see [`TaskGraph::cycles`].
    pub fn from_task_set(tasks: &TaskSet) -> Result<Self> {
        let mut graph = Self::new();
        for id in tasks.ids() {
            graph.add_task(id.clone());
        }
        for (id, descriptor) in tasks.iter() {
            for predecessor in &descriptor.context {
                if !graph.contains_task(predecessor) {
                    return Err(Error::UnknownPredecessor {
                        task: id.to_string(),
                        predecessor: predecessor.to_string(),
                    });
                }
                graph.add_dependency(predecessor, id)?;
            }
        }
        Ok(graph)
    }

    /// Add a task. Adding an existing identifier returns its index.
    pub fn add_task(&mut self, id: TaskId) -> NodeIndex {
        if let Some(&index) = self.task_index.get(&id) {
            return index;
        }
        let index = self.graph.add_node(id.clone());
        self.task_index.insert(id, index);
        index
    }

    /// Record that `from` must run before `to`.
    pub fn add_dependency(&mut self, from: &TaskId, to: &TaskId) -> Result<()> {
        let from_index = self
            .task_index
            .get(from)
            .ok_or_else(|| Error::Validation(format!("Task {} not found in graph", from)))?;
        let to_index = self
            .task_index
            .get(to)
            .ok_or_else(|| Error::Validation(format!("Task {} not found in graph", to)))?;

        if self.graph.find_edge(*from_index, *to_index).is_none() {
            self.graph.add_edge(*from_index, *to_index, ());
        }
        Ok(())
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct predecessors of a task.
    pub fn dependencies(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Tasks that directly consume the output of `id`.
    pub fn dependents(&self, id: &TaskId) -> Vec<&TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<&TaskId> {
        let Some(&index) = self.task_index.get(id) else {
            return Vec::new();
        };
        let mut found: Vec<NodeIndex> = self.graph.neighbors_directed(index, direction).collect();
        found.sort();
        found
            .into_iter()
            .filter_map(|n| self.graph.node_weight(n))
            .collect()
    }

    /// Every task that participates in a cycle, in declaration order.
    ///
    /// Self-references count as cycles. Empty for an acyclic graph.
    pub fn cycles(&self) -> Vec<TaskId> {
        let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some()
            })
            .flatten()
            .collect();
        members.sort();
        members
            .into_iter()
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect()
    }

    /// Fail with [`Error::DependencyCycle`] if any cycle exists.
    pub fn ensure_acyclic(&self) -> Result<()> {
        let cycle = self.cycles();
        if cycle.is_empty() {
            Ok(())
        } else {
            Err(Error::DependencyCycle {
                tasks: cycle.into_iter().map(|id| id.0).collect(),
            })
        }
    }

    /// Topological order that stays as close to declaration order as the
    /// dependencies allow: at each step the earliest-declared ready task
    /// is taken.
    pub fn execution_order(&self) -> Result<Vec<&TaskId>> {
        self.ensure_acyclic()?;

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(&self.graph[node]);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        Ok(order)
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
