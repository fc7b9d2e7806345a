//! Dataflow graph engine.
//!
//! Nodes are wired into a directed topology and partitioned automatically
//! into subgraphs, the unit of concurrency.
//!
//! # Architecture
//!
//! - **Direct edges** ([`Graph::connect`]) share an output cell between two
//!   nodes. Both endpoints land in one subgraph, merging subgraphs as needed.
//! - **Queued edges** ([`Graph::connect_queued`]) cross a thread boundary
//!   through a bounded [`Queue`](crate::queue::Queue). The consumer subgraph
//!   is clocked by its single inbound queue.
//! - **Scheduling**: [`Graph::start`] orders every subgraph once (Kahn's
//!   algorithm), then runs each on its own thread: reset all, process all,
//!   repeat. Start and stop are coordinated with two [`Latch`](crate::latch::Latch)es.
//! - **Controls**: [`Graph::bind`] names control ports;
//!   [`Graph::post_updates`] sends one batch per affected subgraph over that
//!   subgraph's channel. Batches are applied on the owning thread only, so
//!   nodes need no locks.
//!
//! # Rules
//!
//! | Rule | Fault |
//! |------|-------|
//! | a node cannot feed itself | [`TopologyFault::SelfConnection`] |
//! | an input is wired at most once | [`PortError::AlreadyConnected`] |
//! | a queue cannot join one subgraph to itself | [`TopologyFault::SameSubgraph`] |
//! | a subgraph has at most one inbound queue | [`TopologyFault::SecondInboundQueue`], [`TopologyFault::MergeInboundQueues`] |
//! | a direct edge cannot close a queue loop | [`TopologyFault::QueueLoop`] |
//! | subgraphs are acyclic | [`GraphError::CycleTopology`] at start |
//!
//! [`TopologyFault::SelfConnection`]: crate::error::TopologyFault::SelfConnection
//! [`TopologyFault::SameSubgraph`]: crate::error::TopologyFault::SameSubgraph
//! [`TopologyFault::SecondInboundQueue`]: crate::error::TopologyFault::SecondInboundQueue
//! [`TopologyFault::MergeInboundQueues`]: crate::error::TopologyFault::MergeInboundQueues
//! [`TopologyFault::QueueLoop`]: crate::error::TopologyFault::QueueLoop
//! [`PortError::AlreadyConnected`]: crate::error::PortError::AlreadyConnected
//! [`GraphError::CycleTopology`]: crate::error::GraphError::CycleTopology
//!
//! # Example
//!
//! ```rust,ignore
//! use sdrflow_core::graph::Graph;
//!
//! let mut graph = Graph::new();
//! let tuner = graph.add(Tuner::new());
//! let demod = graph.add(FmDemod::new());
//! let encoder = graph.add(Encoder::new());
//!
//! graph.connect(tuner, demod)?;
//! graph.connect_queued(demod, encoder)?;
//! graph.bind::<f64>(tuner, Tuner::FREQ, "freq", None)?;
//!
//! graph.start()?;
//! graph.post_updates(&ControlUpdates::from([("freq".into(), ControlValue::Double(103.5e6))]))?;
//! graph.stop();
//! ```

pub mod adapters;
mod binding;
mod partition;
mod processing;
mod runner;
mod schedule;

pub use adapters::{QueueBridge, QueueReader, QueueWriter};
pub use binding::{ControlHandle, ControlUpdates};
pub use partition::SubgraphId;
pub use processing::{DEFAULT_DATA_WAIT, DEFAULT_QUEUE_CAPACITY, Graph, GraphOptions};
