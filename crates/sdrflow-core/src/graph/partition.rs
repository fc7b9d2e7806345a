//! Subgraph discovery as a union-find over subgraph indices.
//!
//! Every direct connection places both endpoints in one subgraph, merging
//! two subgraphs when needed. A merged-away entry keeps its slot and points
//! at the survivor; its nodes, edges, inbound queue and pending control
//! batches are moved into the survivor so no data is aliased.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

use super::binding::ControlBatch;
use crate::error::TopologyFault;
use crate::node::NodeId;
use crate::queue::DataQueue;

/// Identifier of a subgraph, the engine's unit of concurrency.
///
/// Identifiers of merged-away subgraphs resolve to the surviving one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubgraphId(pub(crate) usize);

impl SubgraphId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SubgraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubgraphId({})", self.0)
    }
}

struct Entry {
    parent: usize,
    nodes: Vec<NodeId>,
    edges: Vec<(NodeId, NodeId)>,
    inbound: Option<Arc<dyn DataQueue>>,
    controls_tx: Sender<ControlBatch>,
    controls_rx: Receiver<ControlBatch>,
}

impl Entry {
    fn new(index: usize) -> Self {
        let (controls_tx, controls_rx) = unbounded();
        Self {
            parent: index,
            nodes: Vec::new(),
            edges: Vec::new(),
            inbound: None,
            controls_tx,
            controls_rx,
        }
    }
}

/// Node → subgraph assignment with merge support.
#[derive(Default)]
pub(crate) struct Partition {
    entries: Vec<Entry>,
    membership: Vec<Option<usize>>,
    /// Queue connections as (producer, consumer) entry indices.
    links: Vec<(usize, usize)>,
}

impl Partition {
    fn root(&self, mut index: usize) -> usize {
        while self.entries[index].parent != index {
            index = self.entries[index].parent;
        }
        index
    }

    /// Resolves a possibly merged-away identifier to its survivor.
    pub(crate) fn find(&self, id: SubgraphId) -> SubgraphId {
        SubgraphId(self.root(id.0))
    }

    /// Current subgraph of `node`, if it was ever connected.
    pub(crate) fn of(&self, node: NodeId) -> Option<SubgraphId> {
        self.membership
            .get(node.slot())
            .copied()
            .flatten()
            .map(|i| SubgraphId(self.root(i)))
    }

    /// Creates an empty subgraph.
    pub(crate) fn create(&mut self) -> SubgraphId {
        let index = self.entries.len();
        self.entries.push(Entry::new(index));
        SubgraphId(index)
    }

    /// Places an unassigned node in `subgraph`.
    pub(crate) fn assign(&mut self, node: NodeId, subgraph: SubgraphId) {
        let root = self.root(subgraph.0);
        if self.membership.len() <= node.slot() {
            self.membership.resize(node.slot() + 1, None);
        }
        self.membership[node.slot()] = Some(root);
        self.entries[root].nodes.push(node);
    }

    /// Records a directed ordering edge inside `subgraph`.
    pub(crate) fn add_edge(&mut self, subgraph: SubgraphId, from: NodeId, to: NodeId) {
        let root = self.root(subgraph.0);
        let entry = &mut self.entries[root];
        if !entry.edges.contains(&(from, to)) {
            entry.edges.push((from, to));
        }
    }

    /// Checks that `a` and `b` may be merged.
    pub(crate) fn check_merge(&self, a: SubgraphId, b: SubgraphId) -> Result<(), TopologyFault> {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return Ok(());
        }
        if self.entries[a.0].inbound.is_some() && self.entries[b.0].inbound.is_some() {
            return Err(TopologyFault::MergeInboundQueues(a, b));
        }
        if self.linked(a, b) {
            return Err(TopologyFault::QueueLoop(a, b));
        }
        Ok(())
    }

    /// Merges two subgraphs and returns the survivor.
    ///
    /// Callers validate with [`check_merge`](Self::check_merge) first.
    pub(crate) fn union(&mut self, a: SubgraphId, b: SubgraphId) -> SubgraphId {
        let (a, b) = (self.root(a.0), self.root(b.0));
        if a == b {
            return SubgraphId(a);
        }
        let (winner, loser) = if self.entries[a].nodes.len() >= self.entries[b].nodes.len() {
            (a, b)
        } else {
            (b, a)
        };

        let nodes = std::mem::take(&mut self.entries[loser].nodes);
        let edges = std::mem::take(&mut self.entries[loser].edges);
        let inbound = self.entries[loser].inbound.take();
        for node in &nodes {
            self.membership[node.slot()] = Some(winner);
        }

        let survivor = &mut self.entries[winner];
        survivor.nodes.extend(nodes);
        for edge in edges {
            if !survivor.edges.contains(&edge) {
                survivor.edges.push(edge);
            }
        }
        if survivor.inbound.is_none() {
            survivor.inbound = inbound;
        }
        self.entries[loser].parent = winner;
        self.forward_batches(loser);

        debug!(
            survivor = winner,
            merged = loser,
            nodes = self.entries[winner].nodes.len(),
            "merged subgraphs"
        );
        SubgraphId(winner)
    }

    /// Moves batches queued on a merged-away entry to its survivor.
    fn forward_batches(&self, index: usize) {
        let root = self.root(index);
        if root == index {
            return;
        }
        for batch in self.entries[index].controls_rx.try_iter() {
            // The survivor holds its own receiver, so this cannot fail.
            let _ = self.entries[root].controls_tx.send(batch);
        }
    }

    /// Forwards batches posted through stale handles to surviving subgraphs.
    pub(crate) fn forward_orphaned_batches(&self) {
        for index in 0..self.entries.len() {
            self.forward_batches(index);
        }
    }

    /// Records a queue from `producer` to `consumer`.
    pub(crate) fn link(&mut self, producer: SubgraphId, consumer: SubgraphId) {
        self.links.push((producer.0, consumer.0));
    }

    /// Returns `true` if a queue connects the two subgraphs in either direction.
    pub(crate) fn linked(&self, a: SubgraphId, b: SubgraphId) -> bool {
        let (a, b) = (self.root(a.0), self.root(b.0));
        self.links.iter().any(|&(p, c)| {
            let (p, c) = (self.root(p), self.root(c));
            (p == a && c == b) || (p == b && c == a)
        })
    }

    pub(crate) fn inbound(&self, subgraph: SubgraphId) -> Option<&Arc<dyn DataQueue>> {
        self.entries[self.root(subgraph.0)].inbound.as_ref()
    }

    pub(crate) fn set_inbound(&mut self, subgraph: SubgraphId, queue: Arc<dyn DataQueue>) {
        let root = self.root(subgraph.0);
        self.entries[root].inbound = Some(queue);
    }

    pub(crate) fn nodes(&self, subgraph: SubgraphId) -> &[NodeId] {
        &self.entries[self.root(subgraph.0)].nodes
    }

    pub(crate) fn edges(&self, subgraph: SubgraphId) -> &[(NodeId, NodeId)] {
        &self.entries[self.root(subgraph.0)].edges
    }

    pub(crate) fn sender(&self, subgraph: SubgraphId) -> Sender<ControlBatch> {
        self.entries[self.root(subgraph.0)].controls_tx.clone()
    }

    pub(crate) fn receiver(&self, subgraph: SubgraphId) -> Receiver<ControlBatch> {
        self.entries[self.root(subgraph.0)].controls_rx.clone()
    }

    /// Surviving, non-empty subgraphs in creation order.
    pub(crate) fn roots(&self) -> Vec<SubgraphId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, e)| e.parent == *i && !e.nodes.is_empty())
            .map(|(i, _)| SubgraphId(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Queue;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    #[test]
    fn union_moves_nodes_and_edges() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.assign(n(0), a);
        p.assign(n(1), a);
        p.add_edge(a, n(0), n(1));
        p.assign(n(2), b);

        let s = p.union(a, b);
        assert_eq!(s, a);
        assert_eq!(p.find(b), a);
        assert_eq!(p.of(n(2)), Some(a));
        assert_eq!(p.nodes(s).len(), 3);
        assert_eq!(p.edges(b), &[(n(0), n(1))]);
        assert_eq!(p.roots(), vec![a]);
    }

    #[test]
    fn smaller_subgraph_is_merged_into_larger() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.assign(n(0), a);
        p.assign(n(1), b);
        p.assign(n(2), b);
        assert_eq!(p.union(a, b), b);
        assert_eq!(p.of(n(0)), Some(b));
    }

    #[test]
    fn merge_rejects_two_inbound_queues() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.set_inbound(a, Arc::new(Queue::<u8>::new(1)));
        p.set_inbound(b, Arc::new(Queue::<u8>::new(1)));
        assert_eq!(
            p.check_merge(a, b),
            Err(TopologyFault::MergeInboundQueues(a, b))
        );
    }

    #[test]
    fn merge_carries_inbound_queue() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.assign(n(0), a);
        p.assign(n(1), b);
        p.assign(n(2), b);
        p.set_inbound(a, Arc::new(Queue::<u8>::new(1)));
        p.check_merge(a, b).unwrap();
        let s = p.union(a, b);
        assert_eq!(s, b);
        assert!(p.inbound(s).is_some());
    }

    #[test]
    fn merge_rejects_queue_linked_subgraphs() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.link(a, b);
        assert!(p.linked(b, a));
        assert_eq!(p.check_merge(b, a), Err(TopologyFault::QueueLoop(b, a)));
    }

    #[test]
    fn pending_batches_follow_merge() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.assign(n(0), a);
        p.assign(n(1), b);
        p.sender(a).send(ControlBatch::default()).unwrap();
        // Equal sizes: the first argument survives.
        let s = p.union(b, a);
        assert_eq!(s, b);
        assert_eq!(p.receiver(s).try_iter().count(), 1);
    }

    #[test]
    fn stale_sender_is_forwarded() {
        let mut p = Partition::default();
        let a = p.create();
        let b = p.create();
        p.assign(n(0), a);
        p.assign(n(1), b);
        p.assign(n(2), b);
        let stale = p.entries[a.0].controls_tx.clone();
        let s = p.union(a, b);
        stale.send(ControlBatch::default()).unwrap();
        p.forward_orphaned_batches();
        assert_eq!(p.receiver(s).try_iter().count(), 1);
    }

    #[test]
    fn unassigned_node_has_no_subgraph() {
        let p = Partition::default();
        assert_eq!(p.of(n(5)), None);
    }
}
