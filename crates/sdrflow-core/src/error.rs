//! Error types for the dataflow engine.
//!
//! Construction-time faults ([`GraphError`]) surface synchronously to the
//! caller assembling the topology. Faults raised by nodes while the graph is
//! running ([`NodeError`]) are contained by the scheduler and only logged.

use std::any::Any;

use thiserror::Error;

use crate::graph::SubgraphId;
use crate::node::NodeId;
use crate::port::PortKind;
use crate::value::ControlKind;

/// Errors raised by a single port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The input has never been wired to an output.
    #[error("input is not connected")]
    Unconnected,

    /// The upstream output holds no value this cycle.
    #[error("no data available this cycle")]
    NoData,

    /// The output was already written since the last reset.
    #[error("output already set this cycle")]
    AlreadySet,

    /// The input is already wired to an output.
    #[error("input is already connected")]
    AlreadyConnected,

    /// The control already has an observer.
    #[error("control is already observed")]
    AlreadyObserving,

    /// The control has no observer to remove.
    #[error("control is not observed")]
    NotObserving,

    /// The two ends of a connection carry different data types.
    #[error("data type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Data type of the receiving port.
        expected: &'static str,
        /// Data type offered by the other end.
        found: &'static str,
    },

    /// The port exists but is of a different kind than required.
    #[error("expected {expected} port, found {found} port")]
    WrongKind {
        /// Kind the operation needs.
        expected: PortKind,
        /// Kind the node declares at that index.
        found: PortKind,
    },

    /// The node declares no port at this index.
    #[error("no port at index {0}")]
    NoSuchPort(usize),

    /// The node has no port of the requested kind at all.
    #[error("node has no {0} port")]
    NoPortOfKind(PortKind),
}

/// Errors raised while converting or applying control values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The posted value has a different kind than the control accepts.
    #[error("expected a {expected} control value, got {found}")]
    TypeMismatch {
        /// Kind the control accepts.
        expected: ControlKind,
        /// Kind of the posted value.
        found: ControlKind,
    },

    /// The bound port is a control of a different data type.
    #[error("control holds {found}, binding expects {expected}")]
    WrongControlType {
        /// Data type the binding was declared with.
        expected: &'static str,
        /// Data type the control port actually holds.
        found: &'static str,
    },

    /// The bound port is not a control port.
    #[error("port {0} is not a control port")]
    NotAControl(usize),

    /// The bound node is not owned by the applying subgraph.
    #[error("node {0} is not owned by this subgraph")]
    ForeignNode(NodeId),

    /// The validator, the observer or the node panicked while the value was applied.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Errors raised by the bounded queue's observer registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The observer is already registered.
    #[error("observer already registered")]
    AlreadyObserving,

    /// The observer was never registered.
    #[error("observer not registered")]
    NotObserving,
}

/// Faults returned by node lifecycle methods.
///
/// The scheduler logs these and keeps running; they never halt a subgraph.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A port precondition failed.
    #[error(transparent)]
    Port(#[from] PortError),

    /// A control value could not be applied.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Node-specific failure.
    #[error("{0}")]
    Failed(String),

    /// The node panicked inside a lifecycle call.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl NodeError {
    /// Creates a node-specific failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::Failed(message.into())
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Result type for node lifecycle methods.
pub type NodeResult<T = ()> = Result<T, NodeError>;

/// The specific rule an illegal topology violates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyFault {
    /// A node was connected to itself.
    #[error("node {0} cannot be connected to itself")]
    SelfConnection(NodeId),

    /// Queue-connecting two nodes that already share a thread.
    #[error("nodes {from} and {to} already share subgraph {subgraph}")]
    SameSubgraph {
        /// Producer node.
        from: NodeId,
        /// Consumer node.
        to: NodeId,
        /// Subgraph both nodes belong to.
        subgraph: SubgraphId,
    },

    /// The destination subgraph is already fed by a queue.
    #[error("subgraph {0} already owns an inbound queue")]
    SecondInboundQueue(SubgraphId),

    /// Merging would join two independently clocked subgraphs.
    #[error("cannot merge subgraphs {0} and {1}: both own an inbound queue")]
    MergeInboundQueues(SubgraphId, SubgraphId),

    /// Merging would place both ends of a queue on one thread.
    #[error("cannot merge subgraphs {0} and {1}: they are linked by a queue")]
    QueueLoop(SubgraphId, SubgraphId),

    /// The topology is frozen while subgraph threads run.
    #[error("topology cannot change while the graph is running")]
    Running,
}

/// Errors raised by graph construction, control routing, and lifecycle calls.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The node handle does not belong to this graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The node is currently owned by a subgraph thread, or was lost.
    #[error("node {0} is not available")]
    NodeUnavailable(NodeId),

    /// A port-level check failed on a node.
    #[error("node {node} port {port}: {source}")]
    Port {
        /// Node owning the port.
        node: NodeId,
        /// Port index on that node.
        port: usize,
        /// Underlying port failure.
        #[source]
        source: PortError,
    },

    /// The requested connection is illegal.
    #[error("bad topology: {0}")]
    BadTopology(#[from] TopologyFault),

    /// A subgraph's edges form a cycle; detected at start.
    #[error("cycle topology in subgraph {subgraph}: {} node(s) never became ready", .remaining.len())]
    CycleTopology {
        /// Subgraph containing the cycle.
        subgraph: SubgraphId,
        /// Nodes left with a nonzero in-degree.
        remaining: Vec<NodeId>,
    },

    /// A binding names a node that belongs to no subgraph.
    #[error("control '{name}' is bound to node {node}, which belongs to no subgraph")]
    InvalidControlNode {
        /// Binding name.
        name: String,
        /// The unassigned node.
        node: NodeId,
    },

    /// A binding does not match the port it targets.
    #[error("cannot bind '{name}' to node {node} port {port}: {source}")]
    Binding {
        /// Binding name.
        name: String,
        /// Target node.
        node: NodeId,
        /// Target port index.
        port: usize,
        /// Why the port does not accept the binding.
        #[source]
        source: ControlError,
    },

    /// Bindings cannot change while the graph runs.
    #[error("bindings cannot change while the graph is running")]
    Frozen,

    /// `start()` was called on a running graph.
    #[error("graph is already running")]
    AlreadyRunning,

    /// `start()` was called on a graph without any connected node.
    #[error("graph has no subgraphs to run")]
    EmptyGraph,

    /// A subgraph thread could not be spawned.
    #[error("failed to spawn subgraph thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl GraphError {
    /// Create a port error attributed to a node and port index.
    pub fn port(node: NodeId, port: usize, source: PortError) -> Self {
        GraphError::Port { node, port, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn topology_fault_display() {
        let err = GraphError::from(TopologyFault::SelfConnection(NodeId(3)));
        assert_eq!(
            err.to_string(),
            "bad topology: node NodeId(3) cannot be connected to itself"
        );
    }

    #[test]
    fn cycle_display_counts_remaining_nodes() {
        let err = GraphError::CycleTopology {
            subgraph: SubgraphId(1),
            remaining: vec![NodeId(0), NodeId(2)],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 node(s)"), "got: {msg}");
    }

    #[test]
    fn port_error_exposes_source() {
        let err = GraphError::port(NodeId(1), 0, PortError::AlreadyConnected);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("already connected"));
    }

    #[test]
    fn node_error_wraps_port_error() {
        let err: NodeError = PortError::NoData.into();
        assert!(matches!(err, NodeError::Port(PortError::NoData)));
        assert_eq!(err.to_string(), "no data available this cycle");
    }

    #[test]
    fn failed_factory() {
        let err = NodeError::failed("device lost");
        assert_eq!(err.to_string(), "device lost");
    }
}
