//! Per-subgraph execution order.

use std::collections::{HashMap, VecDeque};

use crate::node::NodeId;

/// Orders `nodes` so every edge points forward, using Kahn's algorithm.
///
/// Nodes that become ready together keep their relative order in `nodes`.
/// On a cycle, returns the nodes whose in-degree never reached zero.
pub(crate) fn topological_order(
    nodes: &[NodeId],
    edges: &[(NodeId, NodeId)],
) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let position: HashMap<NodeId, usize> =
        nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
    let mut in_degree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (from, to) in edges {
        if let (Some(&f), Some(&t)) = (position.get(from), position.get(to)) {
            successors[f].push(t);
            in_degree[t] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = ready.pop_front() {
        order.push(nodes[i]);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() != nodes.len() {
        let remaining = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i])
            .collect();
        return Err(remaining);
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<NodeId> {
        raw.iter().map(|&i| NodeId(i)).collect()
    }

    #[test]
    fn chain_is_ordered() {
        let nodes = ids(&[2, 0, 1]);
        let edges = [(NodeId(0), NodeId(1)), (NodeId(1), NodeId(2))];
        assert_eq!(topological_order(&nodes, &edges), Ok(ids(&[0, 1, 2])));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let nodes = ids(&[3, 1, 2]);
        assert_eq!(topological_order(&nodes, &[]), Ok(ids(&[3, 1, 2])));
    }

    #[test]
    fn diamond() {
        let nodes = ids(&[0, 1, 2, 3]);
        let edges = [
            (NodeId(0), NodeId(1)),
            (NodeId(0), NodeId(2)),
            (NodeId(1), NodeId(3)),
            (NodeId(2), NodeId(3)),
        ];
        assert_eq!(topological_order(&nodes, &edges), Ok(ids(&[0, 1, 2, 3])));
    }

    #[test]
    fn cycle_reports_remaining_nodes() {
        let nodes = ids(&[0, 1, 2]);
        let edges = [
            (NodeId(0), NodeId(1)),
            (NodeId(1), NodeId(2)),
            (NodeId(2), NodeId(1)),
        ];
        assert_eq!(topological_order(&nodes, &edges), Err(ids(&[1, 2])));
    }

    proptest::proptest! {
        #[test]
        fn forward_edges_are_respected(
            raw in proptest::collection::vec((0u32..16, 0u32..16), 0..40),
        ) {
            let nodes = ids(&(0..16).collect::<Vec<_>>());
            // Only low-to-high edges, so the graph is acyclic.
            let edges: Vec<_> = raw
                .iter()
                .filter(|(a, b)| a < b)
                .map(|&(a, b)| (NodeId(a), NodeId(b)))
                .collect();
            let order = topological_order(&nodes, &edges).unwrap();
            proptest::prop_assert_eq!(order.len(), nodes.len());
            let rank: HashMap<NodeId, usize> =
                order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
            for (from, to) in &edges {
                proptest::prop_assert!(rank[from] < rank[to]);
            }
        }
    }
}
