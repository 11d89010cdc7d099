//! Dependency graph: one node per task, layered in topological order.
//!
//! Nodes and edges live in flat arenas and refer to each other by index.
//! Three kinds of edges feed a node:
//! - explicit dependencies (dependee to dependant)
//! - inherited copies of a dependency on a container, one per descendant
//! - containment edges from each child to its parent
//!
//! All three take part in layering, so a node is scheduled after every
//! dependee and after all of its children.

mod edge;

pub use edge::{DependencyEdge, EdgeIndex, EdgeKind};

use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::error::GraphError;
use crate::interner::TaskId;
use crate::log_debug;
use crate::manager::TaskManager;

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// Graph node for one task.
#[derive(Debug, Clone)]
pub struct Node {
    pub task: TaskId,
    pub incoming: Vec<EdgeIndex>,
    /// `None` until layered; stays `None` for nodes blocked by a cycle.
    pub layer: Option<usize>,
}

/// Layered graph built from a snapshot of the manager's tasks.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    edges: Vec<DependencyEdge>,
    index: FxHashMap<TaskId, NodeIndex>,
    layers: Vec<Vec<NodeIndex>>,
    cycle: Option<Vec<TaskId>>,
}

impl DependencyGraph {
    /// Build nodes and edges for every live task and assign layers.
    pub fn build(manager: &TaskManager, verbosity: u8) -> Self {
        let mut graph = Self {
            nodes: Vec::with_capacity(manager.len()),
            edges: Vec::new(),
            index: FxHashMap::default(),
            layers: Vec::new(),
            cycle: None,
        };
        for task in manager.tasks() {
            graph.index.insert(task.id, NodeIndex(graph.nodes.len()));
            graph.nodes.push(Node {
                task: task.id,
                incoming: Vec::new(),
                layer: None,
            });
        }

        for task in manager.tasks() {
            if let Some(parent) = manager.parent(task.id) {
                graph.add_edge(DependencyEdge::containment(task.id, parent));
            }
        }
        for dep in manager.dependencies() {
            graph.add_edge(DependencyEdge::explicit(dep, dep.dependant));
            for descendant in manager.descendants(dep.dependant) {
                graph.add_edge(DependencyEdge::explicit(dep, descendant));
            }
        }

        graph.assign_layers();
        log_debug!(
            verbosity,
            "Dependency graph: {} nodes, {} edges, {} layers",
            graph.nodes.len(),
            graph.edges.len(),
            graph.layers.len()
        );
        for (i, layer) in graph.layers.iter().enumerate() {
            let tasks: Vec<TaskId> = layer.iter().map(|n| graph.nodes[n.0].task).collect();
            log_debug!(verbosity, "  layer {}: {:?}", i, tasks);
        }
        graph
    }

    fn add_edge(&mut self, edge: DependencyEdge) {
        if !self.index.contains_key(&edge.src()) {
            return;
        }
        let Some(dst) = self.index.get(&edge.dst()).copied() else {
            return;
        };
        let idx = EdgeIndex(self.edges.len());
        self.edges.push(edge);
        self.nodes[dst.0].incoming.push(idx);
    }

    /// Longest-path layering with Kahn's algorithm.
    ///
    /// A node's layer is one more than the highest layer among its sources.
    /// Nodes left with unresolved in-degree are on a cycle or downstream
    /// of one.
    fn assign_layers(&mut self) {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.incoming.len()).collect();
        let mut outgoing: Vec<Vec<NodeIndex>> = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for edge in &node.incoming {
                let edge = &self.edges[edge.0];
                if let (Some(src), Some(dst)) = (self.index.get(&edge.src()), self.index.get(&edge.dst())) {
                    outgoing[src.0].push(*dst);
                }
            }
        }

        let mut queue: VecDeque<NodeIndex> = (0..self.nodes.len())
            .filter(|i| in_degree[*i] == 0)
            .map(NodeIndex)
            .collect();
        for start in &queue {
            self.nodes[start.0].layer = Some(0);
        }

        let mut processed = 0;
        while let Some(current) = queue.pop_front() {
            processed += 1;
            let layer = self.nodes[current.0].layer.unwrap_or(0);
            for next in &outgoing[current.0] {
                let slot = &mut self.nodes[next.0].layer;
                *slot = Some(slot.map_or(layer + 1, |l| l.max(layer + 1)));
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    queue.push_back(*next);
                }
            }
        }

        if processed != self.nodes.len() {
            let tasks: Vec<TaskId> = self
                .nodes
                .iter_mut()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, node)| {
                    node.layer = None;
                    node.task
                })
                .collect();
            self.cycle = Some(tasks);
            self.layers.clear();
            return;
        }

        let count = self
            .nodes
            .iter()
            .filter_map(|n| n.layer)
            .max()
            .map_or(0, |l| l + 1);
        self.layers = vec![Vec::new(); count];
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(layer) = node.layer {
                self.layers[layer].push(NodeIndex(i));
            }
        }
    }

    /// Number of layers, or the tasks on a cycle when no layering exists.
    pub fn check_layer_validity(&self) -> Result<usize, GraphError> {
        match &self.cycle {
            Some(tasks) => Err(GraphError::Cycle {
                tasks: tasks.clone(),
            }),
            None => Ok(self.layers.len()),
        }
    }

    /// Nodes of layer `i`; empty past the last layer.
    pub fn layer(&self, i: usize) -> &[NodeIndex] {
        self.layers.get(i).map(|l| l.as_slice()).unwrap_or(&[])
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.0]
    }

    pub fn node_for(&self, task: TaskId) -> Option<NodeIndex> {
        self.index.get(&task).copied()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge(&self, idx: EdgeIndex) -> &DependencyEdge {
        &self.edges[idx.0]
    }

    pub fn edge_mut(&mut self, idx: EdgeIndex) -> &mut DependencyEdge {
        &mut self.edges[idx.0]
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }
}
