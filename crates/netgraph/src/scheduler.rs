use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::errors::{CompileError, Result};
use crate::graph::GraphModel;

/// Computes the topological order every later stage iterates in.
///
/// Kahn's algorithm with a min-heap keyed by declaration index: whenever
/// several nodes are ready, the one declared first in the payload goes
/// first. This keeps generated names stable for a given payload.
pub fn schedule(graph: &GraphModel) -> Result<Vec<usize>> {
    // in_degree[node] = number of distinct parents not yet scheduled
    let mut in_degree: Vec<usize> = (0..graph.len())
        .map(|idx| graph.predecessors(idx).len())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &next in graph.successors(idx) {
            let degree = &mut in_degree[next];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != graph.len() {
        let stuck = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(idx, _)| graph.node(idx).id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CompileError::CircularDependency(format!(
            "no topological order; unresolved nodes: {}",
            stuck
        )));
    }

    tracing::debug!("Scheduled {} nodes", order.len());
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeRecord, NodeRecord};

    fn build(ids: &[&str], edges: &[(&str, &str)]) -> GraphModel {
        let nodes: Vec<_> = ids.iter().map(|id| NodeRecord::new(*id, "relu")).collect();
        let edges: Vec<_> = edges.iter().map(|(s, t)| EdgeRecord::new(*s, *t)).collect();
        GraphModel::build(&nodes, &edges).unwrap()
    }

    #[test]
    fn test_independent_nodes_keep_declaration_order() {
        let graph = build(&["c", "a", "b"], &[]);
        assert_eq!(schedule(&graph).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dependencies_override_declaration_order() {
        // "sink" is declared first but depends on both others
        let graph = build(&["sink", "left", "right"], &[("left", "sink"), ("right", "sink")]);
        assert_eq!(schedule(&graph).unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_ready_nodes_tie_break_by_declaration() {
        // After "root", both branches are ready; declaration order decides
        let graph = build(
            &["root", "second", "third", "join"],
            &[
                ("root", "third"),
                ("root", "second"),
                ("second", "join"),
                ("third", "join"),
            ],
        );
        assert_eq!(schedule(&graph).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_multi_edges_do_not_stall_the_queue() {
        let graph = build(&["a", "b"], &[("a", "b"), ("a", "b")]);
        assert_eq!(schedule(&graph).unwrap(), vec![0, 1]);
    }
}
