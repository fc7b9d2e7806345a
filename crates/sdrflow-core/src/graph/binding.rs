//! Named control bindings and update routing.
//!
//! [`Graph::bind`](super::Graph::bind) associates an external name with a
//! control port. Posting updates groups them by owning subgraph and sends
//! one [`ControlBatch`] per subgraph over that subgraph's channel. The
//! subgraph thread applies the batch at the top of its next cycle, so a
//! node's controls are only ever written by the thread that runs it.

use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::partition::SubgraphId;
use crate::error::{ControlError, GraphError, panic_message};
use crate::node::{Node, NodeId};
use crate::port::{Control, ControlPort, PortMut};
use crate::value::{ControlData, ControlValue, Validator};

/// Name → value map of control updates.
pub type ControlUpdates = BTreeMap<String, ControlValue>;

type Setter = Arc<dyn Fn(&mut dyn ControlPort, &ControlValue) -> Result<(), ControlError> + Send + Sync>;

/// One bound control port.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) node: NodeId,
    pub(crate) port: usize,
    setter: Setter,
}

impl Binding {
    /// Creates a binding whose setter converts to `T` and applies `validator`.
    pub(crate) fn typed<T: ControlData>(
        node: NodeId,
        port: usize,
        validator: Option<Validator<T>>,
    ) -> Self {
        let setter: Setter = Arc::new(move |port: &mut dyn ControlPort, value: &ControlValue| {
            set_typed::<T>(port, value, validator.as_ref())
        });
        Self { node, port, setter }
    }

    fn apply(&self, node: &mut dyn Node, value: &ControlValue) -> Result<(), ControlError> {
        match node.port(self.port) {
            Some(PortMut::Control(control)) => (self.setter)(control, value),
            _ => Err(ControlError::NotAControl(self.port)),
        }
    }

    /// Like `apply`, but a panic in the node, validator or observer becomes an error.
    fn apply_contained(&self, node: &mut dyn Node, value: &ControlValue) -> Result<(), ControlError> {
        catch_unwind(AssertUnwindSafe(|| self.apply(node, value)))
            .unwrap_or_else(|payload| Err(ControlError::Panicked(panic_message(payload.as_ref()))))
    }
}

fn set_typed<T: ControlData>(
    port: &mut dyn ControlPort,
    value: &ControlValue,
    validator: Option<&Validator<T>>,
) -> Result<(), ControlError> {
    let found = port.type_name();
    let control = port
        .as_any_mut()
        .downcast_mut::<Control<T>>()
        .ok_or(ControlError::WrongControlType {
            expected: type_name::<T>(),
            found,
        })?;
    let mut converted = T::from_value(value)?;
    if let Some(validate) = validator {
        converted = validate(converted);
    }
    control.set(converted);
    Ok(())
}

/// External name → bound control ports.
#[derive(Clone, Default)]
pub(crate) struct BindingTable {
    entries: BTreeMap<String, Vec<Binding>>,
}

impl BindingTable {
    pub(crate) fn insert(&mut self, name: String, binding: Binding) {
        self.entries.entry(name).or_default().push(binding);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Binding>)> {
        self.entries.iter()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Updates destined for one subgraph.
#[derive(Default)]
pub(crate) struct ControlBatch {
    updates: Arc<ControlUpdates>,
    targets: Vec<(String, Binding)>,
}

impl ControlBatch {
    /// Applies every target owned by `nodes`, logging failures.
    ///
    /// `index` maps a node handle to its position in `nodes`.
    pub(crate) fn apply(
        &self,
        subgraph: SubgraphId,
        nodes: &mut [(NodeId, Box<dyn Node>)],
        index: &HashMap<NodeId, usize>,
    ) {
        for (name, binding) in &self.targets {
            let Some(value) = self.updates.get(name) else {
                continue;
            };
            let result = match index.get(&binding.node) {
                Some(&i) => binding.apply_contained(nodes[i].1.as_mut(), value),
                None => Err(ControlError::ForeignNode(binding.node)),
            };
            match result {
                Ok(()) => debug!(%subgraph, control = %name, %value, "control applied"),
                Err(e) => warn!(
                    %subgraph,
                    control = %name,
                    node = %binding.node,
                    port = binding.port,
                    error = %e,
                    "control update rejected"
                ),
            }
        }
    }
}

#[derive(Clone)]
struct Route {
    binding: Binding,
    target: Option<(SubgraphId, Sender<ControlBatch>)>,
}

/// Cloneable handle for posting control updates from any thread.
///
/// The handle captures the routing at the time it was taken, so take it
/// after the topology is complete.
#[derive(Clone, Default)]
pub struct ControlHandle {
    routes: Arc<BTreeMap<String, Vec<Route>>>,
}

impl ControlHandle {
    pub(crate) fn new(
        bindings: &BindingTable,
        resolve: impl Fn(NodeId) -> Option<(SubgraphId, Sender<ControlBatch>)>,
    ) -> Self {
        let routes = bindings
            .iter()
            .map(|(name, bound)| {
                let routes = bound
                    .iter()
                    .map(|binding| Route {
                        binding: binding.clone(),
                        target: resolve(binding.node),
                    })
                    .collect();
                (name.clone(), routes)
            })
            .collect();
        Self {
            routes: Arc::new(routes),
        }
    }

    /// Bound control names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Sends `updates` to the subgraphs owning the bound nodes.
    ///
    /// Names without a binding are ignored. Each affected subgraph receives
    /// one batch, applied on its own thread at the top of its next cycle.
    /// Returns the number of subgraphs that received a batch.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidControlNode`] if a bound node belongs to no
    /// subgraph. Updates for every other target are still dispatched.
    pub fn post_updates(&self, updates: &ControlUpdates) -> Result<usize, GraphError> {
        let mut batches: BTreeMap<SubgraphId, (Sender<ControlBatch>, Vec<(String, Binding)>)> =
            BTreeMap::new();
        let mut relevant = ControlUpdates::new();
        let mut invalid = None;

        for (name, value) in updates {
            let Some(routes) = self.routes.get(name) else {
                debug!(control = %name, "no binding for control update");
                continue;
            };
            relevant.insert(name.clone(), value.clone());
            for route in routes {
                match &route.target {
                    Some((subgraph, tx)) => batches
                        .entry(*subgraph)
                        .or_insert_with(|| (tx.clone(), Vec::new()))
                        .1
                        .push((name.clone(), route.binding.clone())),
                    None => {
                        invalid.get_or_insert_with(|| GraphError::InvalidControlNode {
                            name: name.clone(),
                            node: route.binding.node,
                        });
                    }
                }
            }
        }

        let updates = Arc::new(relevant);
        let dispatched = batches.len();
        for (subgraph, (tx, targets)) in batches {
            let batch = ControlBatch {
                updates: Arc::clone(&updates),
                targets,
            };
            if tx.send(batch).is_err() {
                warn!(%subgraph, "subgraph no longer accepts control updates");
            }
        }

        match invalid {
            Some(err) => Err(err),
            None => Ok(dispatched),
        }
    }
}

impl std::fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlHandle")
            .field("names", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}
