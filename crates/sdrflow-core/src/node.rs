//! The node contract.
//!
//! A node is a processing unit that owns a fixed set of ports and four
//! lifecycle operations. The scheduler drives every node of a subgraph through
//!
//! ```text
//! init → (reset → process)* → destroy
//! ```
//!
//! on that subgraph's thread only, so a node never needs internal locking.
//! Faults returned from any lifecycle call are logged by the scheduler and do
//! not stop the pipeline.

use std::fmt;

use crate::error::{NodeResult, PortError};
use crate::port::{PortKind, PortMut};

/// Handle to a node owned by a [`Graph`](crate::graph::Graph).
///
/// Handles are assigned sequentially by the graph and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A processing unit in the dataflow graph.
///
/// Ports are addressed by a stable index in `0..port_count()`. The set of
/// ports must not change after construction.
///
/// # Example
///
/// ```rust
/// use sdrflow_core::error::NodeResult;
/// use sdrflow_core::node::Node;
/// use sdrflow_core::port::{Input, Output, PortMut};
///
/// struct Doubler {
///     input: Input<f32>,
///     output: Output<f32>,
/// }
///
/// impl Node for Doubler {
///     fn port_count(&self) -> usize {
///         2
///     }
///
///     fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
///         match index {
///             0 => Some(PortMut::from(&mut self.input)),
///             1 => Some(PortMut::from(&mut self.output)),
///             _ => None,
///         }
///     }
///
///     fn process(&mut self) -> NodeResult {
///         let x = self.input.read()?;
///         self.output.store(*x * 2.0)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Node: Send {
    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Number of ports this node declares.
    fn port_count(&self) -> usize;

    /// Mutable access to the port at `index`.
    fn port(&mut self, index: usize) -> Option<PortMut<'_>>;

    /// Called once on the subgraph thread before the first cycle.
    fn init(&mut self) -> NodeResult {
        Ok(())
    }

    /// Called at the top of every cycle. The default clears every output.
    fn reset(&mut self) -> NodeResult {
        for index in 0..self.port_count() {
            if let Some(PortMut::Output(out)) = self.port(index) {
                out.clear();
            }
        }
        Ok(())
    }

    /// Reads ready inputs and writes outputs.
    fn process(&mut self) -> NodeResult;

    /// Called once on the subgraph thread after the stop barrier.
    fn destroy(&mut self) -> NodeResult {
        Ok(())
    }
}

/// Index of the first port of `kind` on `node`.
///
/// # Errors
///
/// [`PortError::NoPortOfKind`] if the node declares none.
pub fn first_port(node: &mut dyn Node, kind: PortKind) -> Result<usize, PortError> {
    (0..node.port_count())
        .find(|&i| node.port(i).is_some_and(|p| p.kind() == kind))
        .ok_or(PortError::NoPortOfKind(kind))
}

/// Kind of the port at `index` on `node`.
///
/// # Errors
///
/// [`PortError::NoSuchPort`] if the index is out of range.
pub fn port_kind(node: &mut dyn Node, index: usize) -> Result<PortKind, PortError> {
    node.port(index)
        .map(|p| p.kind())
        .ok_or(PortError::NoSuchPort(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{Control, Input, Output};

    struct Probe {
        gain: Control<f64>,
        input: Input<f64>,
        output: Output<f64>,
    }

    impl Node for Probe {
        fn port_count(&self) -> usize {
            3
        }

        fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
            match index {
                0 => Some(PortMut::from(&mut self.gain)),
                1 => Some(PortMut::from(&mut self.input)),
                2 => Some(PortMut::from(&mut self.output)),
                _ => None,
            }
        }

        fn process(&mut self) -> NodeResult {
            self.output.store(*self.gain.value())?;
            Ok(())
        }
    }

    fn probe() -> Probe {
        Probe {
            gain: Control::new(0.5),
            input: Input::new(),
            output: Output::new(),
        }
    }

    #[test]
    fn default_reset_clears_outputs() {
        let mut node = probe();
        node.process().unwrap();
        assert!(node.output.is_set());
        node.reset().unwrap();
        assert!(!node.output.is_set());
        node.process().unwrap();
        assert_eq!(*node.output.value().unwrap(), 0.5);
    }

    #[test]
    fn second_process_without_reset_fails() {
        let mut node = probe();
        node.process().unwrap();
        assert!(node.process().is_err());
    }

    #[test]
    fn first_port_by_kind() {
        let mut node = probe();
        assert_eq!(first_port(&mut node, PortKind::Input), Ok(1));
        assert_eq!(first_port(&mut node, PortKind::Output), Ok(2));
        assert_eq!(port_kind(&mut node, 0), Ok(PortKind::Control));
        assert_eq!(port_kind(&mut node, 9), Err(PortError::NoSuchPort(9)));
    }

    #[test]
    fn default_name_is_type_name() {
        let node = probe();
        assert!(node.name().ends_with("Probe"));
    }

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId(7).to_string(), "NodeId(7)");
        assert_eq!(NodeId(7).index(), 7);
    }
}
