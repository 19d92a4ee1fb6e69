//! Graph model: node table, adjacency and cycle detection.
//!
//! Nodes are addressed by their declaration index (position in the input
//! node list). Every later stage works on these indices, so the declaration
//! order doubles as the deterministic tie-break everywhere.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;

use crate::errors::{CompileError, Result};
use crate::types::{EdgeRecord, NodeId, NodeRecord};

#[derive(Debug, Clone)]
pub struct GraphModel {
    nodes: Vec<NodeRecord>,
    index: HashMap<NodeId, usize>,
    edge_count: usize,
    /// Distinct predecessors, in first-edge order
    predecessors: Vec<Vec<usize>>,
    /// Distinct successors, in first-edge order
    successors: Vec<Vec<usize>>,
    /// Every incoming edge source, duplicates kept
    incoming: Vec<Vec<usize>>,
}

impl GraphModel {
    pub fn build(nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(CompileError::DuplicateNode(node.id.clone()));
            }
        }

        let mut predecessors = vec![Vec::new(); nodes.len()];
        let mut successors = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];

        for edge in edges {
            let lookup = |id: &NodeId| {
                index
                    .get(id)
                    .copied()
                    .ok_or_else(|| CompileError::UnknownEdgeEndpoint {
                        from: edge.source.clone(),
                        to: edge.target.clone(),
                        missing: id.clone(),
                    })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;

            incoming[target].push(source);
            if !predecessors[target].contains(&source) {
                predecessors[target].push(source);
            }
            if !successors[source].contains(&target) {
                successors[source].push(target);
            }
        }

        let graph = Self {
            nodes: nodes.to_vec(),
            index,
            edge_count: edges.len(),
            predecessors,
            successors,
            incoming,
        };
        graph.detect_cycles()?;

        tracing::debug!(
            "Graph built: {} nodes, {} edges",
            graph.len(),
            graph.edge_count
        );
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn node(&self, idx: usize) -> &NodeRecord {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.predecessors[idx]
    }

    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    /// Sources of all incoming edges in edge order, repeated once per edge.
    pub fn incoming(&self, idx: usize) -> &[usize] {
        &self.incoming[idx]
    }

    /// Nodes sharing at least one parent with `idx`, excluding `idx` itself.
    pub fn siblings(&self, idx: usize) -> BTreeSet<usize> {
        self.predecessors[idx]
            .iter()
            .flat_map(|&parent| self.successors[parent].iter().copied())
            .filter(|&child| child != idx)
            .collect()
    }

    /// Depth-first search with an explicit stack, so long chains cannot
    /// exhaust the thread stack. Reports the first cycle found as an id path.
    fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        // (node, index of the next successor to explore)
        let mut path: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::OnPath;
            path.push((root, 0));

            while let Some(frame) = path.last_mut() {
                let (idx, cursor) = *frame;
                let Some(&next) = self.successors[idx].get(cursor) else {
                    marks[idx] = Mark::Done;
                    path.pop();
                    continue;
                };
                frame.1 += 1;

                match marks[next] {
                    Mark::Unvisited => {
                        marks[next] = Mark::OnPath;
                        path.push((next, 0));
                    }
                    Mark::OnPath => return Err(self.cycle_error(&path, next)),
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    fn cycle_error(&self, path: &[(usize, usize)], back_to: usize) -> CompileError {
        let start = path.iter().position(|&(n, _)| n == back_to).unwrap_or(0);
        let cycle = path[start..]
            .iter()
            .map(|&(n, _)| n)
            .chain(std::iter::once(back_to))
            .map(|n| self.nodes[n].id.to_string())
            .join(" -> ");
        CompileError::CircularDependency(cycle)
    }
}
