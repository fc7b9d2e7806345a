//! sdrflow Core - dataflow graph engine for streaming signal processing
//!
//! This crate provides the execution substrate for software-defined-radio
//! pipelines: small processing units are wired into a directed topology,
//! partitioned into independently scheduled subgraphs, and driven cycle after
//! cycle with bounded hand-off between subgraphs.
//!
//! # Core Abstractions
//!
//! ## Ports and Nodes
//!
//! - [`Output`] / [`Input`] - Single-assignment-per-cycle data slots shared
//!   between nodes of one subgraph without copying
//! - [`Control`] - Externally settable parameter with one optional observer
//! - [`Node`] - Object-safe trait with `init`/`reset`/`process`/`destroy`
//!
//! ## Cross-thread Hand-off
//!
//! - [`Queue`] - Bounded FIFO of shared items with lossy and rejecting pushes
//! - [`Latch`] - Countdown latch used for coordinated start and stop
//!
//! ## Graph
//!
//! - [`Graph`] - Topology builder, subgraph scheduler, control router
//! - [`ControlHandle`] - Posts control updates from any thread
//!
//! ## Values
//!
//! - [`ControlValue`] - Dynamically typed control value
//! - [`MetadataPacket`] - Name → value map serialized to JSON
//!
//! # Example
//!
//! ```rust
//! use sdrflow_core::{
//!     Control, ControlUpdates, ControlValue, Graph, Input, Node, NodeResult, Output, PortMut,
//! };
//!
//! struct Counter {
//!     out: Output<u64>,
//!     n: u64,
//! }
//!
//! impl Node for Counter {
//!     fn port_count(&self) -> usize {
//!         1
//!     }
//!     fn port(&mut self, i: usize) -> Option<PortMut<'_>> {
//!         (i == 0).then(|| PortMut::from(&mut self.out))
//!     }
//!     fn process(&mut self) -> NodeResult {
//!         self.n += 1;
//!         self.out.store(self.n)?;
//!         Ok(())
//!     }
//! }
//!
//! struct Scale {
//!     input: Input<u64>,
//!     factor: Control<u32>,
//! }
//!
//! impl Node for Scale {
//!     fn port_count(&self) -> usize {
//!         2
//!     }
//!     fn port(&mut self, i: usize) -> Option<PortMut<'_>> {
//!         match i {
//!             0 => Some(PortMut::from(&mut self.input)),
//!             1 => Some(PortMut::from(&mut self.factor)),
//!             _ => None,
//!         }
//!     }
//!     fn process(&mut self) -> NodeResult {
//!         let _scaled = *self.input.read()? * u64::from(*self.factor.value());
//!         Ok(())
//!     }
//! }
//!
//! let mut graph = Graph::new();
//! let counter = graph.add(Counter { out: Output::new(), n: 0 });
//! let scale = graph.add(Scale { input: Input::new(), factor: Control::new(2) });
//! graph.connect(counter, scale)?;
//! graph.bind::<u32>(scale, 1, "factor", None)?;
//!
//! graph.start()?;
//! let updates = ControlUpdates::from([("factor".to_string(), ControlValue::UInt(3))]);
//! assert_eq!(graph.post_updates(&updates)?, 1);
//! graph.stop();
//! # Ok::<(), sdrflow_core::GraphError>(())
//! ```

pub mod error;
pub mod graph;
pub mod latch;
pub mod metadata;
pub mod node;
pub mod port;
pub mod queue;
pub mod value;

pub use error::{
    ControlError, GraphError, NodeError, NodeResult, PortError, QueueError, TopologyFault,
};
pub use graph::{
    ControlHandle, ControlUpdates, DEFAULT_DATA_WAIT, DEFAULT_QUEUE_CAPACITY, Graph, GraphOptions,
    QueueReader, QueueWriter, SubgraphId,
};
pub use latch::Latch;
pub use metadata::MetadataPacket;
pub use node::{Node, NodeId};
pub use port::{
    Control, ControlPort, Input, InputPort, Output, OutputPort, PortData, PortKind, PortMut,
};
pub use queue::{DataQueue, LossyPush, Queue, QueueObserver};
pub use value::{ControlData, ControlKind, ControlValue, Validator, clamp};
