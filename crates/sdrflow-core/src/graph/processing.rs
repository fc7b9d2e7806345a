//! Dataflow graph: topology builder, lifecycle, and control routing.
//!
//! [`Graph`] owns every node in an arena addressed by [`NodeId`]. Connecting
//! nodes assigns them to subgraphs; [`Graph::start`] moves each subgraph's
//! nodes onto a dedicated thread and [`Graph::stop`] hands them back.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use super::adapters::{QueueReader, QueueWriter};
use super::binding::{Binding, BindingTable, ControlHandle, ControlUpdates};
use super::partition::{Partition, SubgraphId};
use super::runner::{OrderedNodes, RunState, SubgraphRun};
use super::schedule::topological_order;
use crate::error::{ControlError, GraphError, PortError, TopologyFault};
use crate::node::{Node, NodeId, first_port};
use crate::port::{PortKind, PortMut};
use crate::queue::DataQueue;
use crate::value::{ControlData, Validator};

/// Default capacity of queues created by [`Graph::connect_queued`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default bound on the inbound-queue wait per cycle.
pub const DEFAULT_DATA_WAIT: Duration = Duration::from_millis(10);

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOptions {
    /// Capacity used by [`Graph::connect_queued`].
    pub default_queue_capacity: usize,
    /// How long a queue-fed subgraph waits for data before re-checking the
    /// stop flag. Bounds shutdown latency.
    pub data_wait: Duration,
    /// Subgraph threads are named `{prefix}-{subgraph}`.
    pub thread_name_prefix: String,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            default_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            data_wait: DEFAULT_DATA_WAIT,
            thread_name_prefix: "sdrflow".to_string(),
        }
    }
}

struct NodeSlot {
    name: String,
    /// `None` while the node runs on its subgraph thread.
    node: Option<Box<dyn Node>>,
    hidden: bool,
}

struct Runtime {
    state: Arc<RunState>,
    threads: Vec<(SubgraphId, JoinHandle<OrderedNodes>)>,
}

/// A dataflow graph of nodes partitioned into concurrently run subgraphs.
///
/// # Usage
///
/// 1. Add nodes: [`add()`](Self::add)
/// 2. Wire them: [`connect()`](Self::connect) for same-thread edges,
///    [`connect_queued()`](Self::connect_queued) for thread boundaries
/// 3. Bind controls: [`bind()`](Self::bind)
/// 4. Run: [`start()`](Self::start), [`post_updates()`](Self::post_updates),
///    [`stop()`](Self::stop)
///
/// The topology is frozen while the graph runs.
pub struct Graph {
    slots: Vec<NodeSlot>,
    partition: Partition,
    bindings: BindingTable,
    options: GraphOptions,
    runtime: Option<Runtime>,
}

impl Graph {
    /// Creates an empty graph with default options.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    /// Creates an empty graph with the given options.
    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            slots: Vec::new(),
            partition: Partition::default(),
            bindings: BindingTable::default(),
            options,
            runtime: None,
        }
    }

    /// Engine options in effect.
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    // --- Nodes ---

    /// Adds a node and returns its handle.
    ///
    /// A node joins a subgraph when it is first connected. Nodes added while
    /// the graph runs are not scheduled until the next start.
    pub fn add(&mut self, node: impl Node + 'static) -> NodeId {
        self.add_boxed(Box::new(node))
    }

    /// Adds an already boxed node and returns its handle.
    pub fn add_boxed(&mut self, node: Box<dyn Node>) -> NodeId {
        self.push_slot(node, false)
    }

    fn push_slot(&mut self, node: Box<dyn Node>, hidden: bool) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        let name = node.name().to_string();
        debug!(node = %id, %name, hidden, "node added");
        self.slots.push(NodeSlot {
            name,
            node: Some(node),
            hidden,
        });
        id
    }

    fn node_slot(&mut self, id: NodeId) -> Result<&mut (dyn Node + 'static), GraphError> {
        self.slots
            .get_mut(id.slot())
            .ok_or(GraphError::NodeNotFound(id))?
            .node
            .as_deref_mut()
            .ok_or(GraphError::NodeUnavailable(id))
    }

    /// Mutable access to a node while the graph is stopped.
    ///
    /// # Errors
    ///
    /// [`GraphError::NodeNotFound`] for a foreign handle,
    /// [`GraphError::NodeUnavailable`] while the node runs.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut (dyn Node + 'static), GraphError> {
        self.node_slot(id)
    }

    /// Name the node reported when it was added.
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.slots.get(id.slot()).map(|s| s.name.as_str())
    }

    /// Number of nodes, including queue adapters inserted by
    /// [`connect_queued`](Self::connect_queued).
    pub fn node_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of nodes added by the caller.
    pub fn user_node_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.hidden).count()
    }

    // --- Topology ---

    fn ensure_stopped(&self) -> Result<(), GraphError> {
        if self.runtime.is_some() {
            return Err(TopologyFault::Running.into());
        }
        Ok(())
    }

    fn port_info(
        &mut self,
        node: NodeId,
        port: usize,
        kind: PortKind,
    ) -> Result<(TypeId, &'static str, bool), GraphError> {
        let n = self.node_slot(node)?;
        let info = match n.port(port) {
            None => Err(PortError::NoSuchPort(port)),
            Some(PortMut::Input(p)) if kind == PortKind::Input => {
                Ok((p.data_type(), p.type_name(), p.is_connected()))
            }
            Some(PortMut::Output(p)) if kind == PortKind::Output => {
                Ok((p.data_type(), p.type_name(), false))
            }
            Some(other) => Err(PortError::WrongKind {
                expected: kind,
                found: other.kind(),
            }),
        };
        info.map_err(|e| GraphError::port(node, port, e))
    }

    fn default_port(&mut self, node: NodeId, kind: PortKind) -> Result<usize, GraphError> {
        first_port(self.node_slot(node)?, kind).map_err(|e| GraphError::port(node, 0, e))
    }

    /// Validates an `Output` → `Input` wiring without changing anything.
    fn check_wiring(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), GraphError> {
        if from == to {
            return Err(TopologyFault::SelfConnection(from).into());
        }
        let (out_type, out_name, _) = self.port_info(from, output, PortKind::Output)?;
        let (in_type, in_name, connected) = self.port_info(to, input, PortKind::Input)?;
        if connected {
            return Err(GraphError::port(to, input, PortError::AlreadyConnected));
        }
        if in_type != out_type {
            return Err(GraphError::port(
                to,
                input,
                PortError::TypeMismatch {
                    expected: in_name,
                    found: out_name,
                },
            ));
        }
        Ok(())
    }

    /// Connects the first output of `from` to the first input of `to`.
    ///
    /// See [`connect_ports`](Self::connect_ports).
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.ensure_stopped()?;
        let output = self.default_port(from, PortKind::Output)?;
        let input = self.default_port(to, PortKind::Input)?;
        self.connect_ports(from, output, to, input)
    }

    /// Wires output port `output` of `from` to input port `input` of `to`.
    ///
    /// Both nodes end up in the same subgraph, merging their subgraphs if
    /// they differ, and `to` is ordered after `from`.
    ///
    /// # Errors
    ///
    /// - [`TopologyFault::SelfConnection`] if `from == to`
    /// - [`PortError::AlreadyConnected`] if the input is already wired
    /// - [`PortError::TypeMismatch`], [`PortError::WrongKind`],
    ///   [`PortError::NoSuchPort`] for mismatched ports
    /// - [`TopologyFault::MergeInboundQueues`] if both subgraphs are queue-fed
    /// - [`TopologyFault::QueueLoop`] if a queue already links the subgraphs
    /// - [`TopologyFault::Running`] while the graph runs
    ///
    /// Nothing is modified when an error is returned.
    pub fn connect_ports(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), GraphError> {
        self.ensure_stopped()?;
        self.check_wiring(from, output, to, input)?;

        let (sa, sb) = (self.partition.of(from), self.partition.of(to));
        if let (Some(a), Some(b)) = (sa, sb) {
            self.partition.check_merge(a, b)?;
        }

        let cell = match self.node_slot(from)?.port(output) {
            Some(PortMut::Output(p)) => p.shared_cell(),
            _ => return Err(GraphError::port(from, output, PortError::NoSuchPort(output))),
        };
        match self.node_slot(to)?.port(input) {
            Some(PortMut::Input(p)) => p.attach(cell).map_err(|e| GraphError::port(to, input, e))?,
            _ => return Err(GraphError::port(to, input, PortError::NoSuchPort(input))),
        }

        let subgraph = match (sa, sb) {
            (Some(a), Some(b)) => self.partition.union(a, b),
            (Some(a), None) => {
                self.partition.assign(to, a);
                a
            }
            (None, Some(b)) => {
                self.partition.assign(from, b);
                b
            }
            (None, None) => {
                let s = self.partition.create();
                self.partition.assign(from, s);
                self.partition.assign(to, s);
                s
            }
        };
        self.partition.add_edge(subgraph, from, to);
        debug!(%from, output, %to, input, %subgraph, "connected");
        Ok(())
    }

    /// Queue-connects the first output of `from` to the first input of `to`
    /// with the default capacity.
    ///
    /// See [`connect_queued_ports`](Self::connect_queued_ports).
    pub fn connect_queued(
        &mut self,
        from: NodeId,
        to: NodeId,
    ) -> Result<Arc<dyn DataQueue>, GraphError> {
        let capacity = self.options.default_queue_capacity;
        self.connect_queued_with_capacity(from, to, capacity)
    }

    /// Queue-connects the first output of `from` to the first input of `to`.
    pub fn connect_queued_with_capacity(
        &mut self,
        from: NodeId,
        to: NodeId,
        capacity: usize,
    ) -> Result<Arc<dyn DataQueue>, GraphError> {
        self.ensure_stopped()?;
        let output = self.default_port(from, PortKind::Output)?;
        let input = self.default_port(to, PortKind::Input)?;
        self.connect_queued_ports(from, output, to, input, capacity)
    }

    /// Connects two ports across a thread boundary.
    ///
    /// Inserts a [`QueueWriter`] in the producer's subgraph and a
    /// [`QueueReader`] in the consumer's, joined by a bounded queue that
    /// becomes the consumer subgraph's inbound queue. Returns the queue.
    ///
    /// # Errors
    ///
    /// - [`TopologyFault::SameSubgraph`] if both nodes already share a subgraph
    /// - [`TopologyFault::SecondInboundQueue`] if the consumer's subgraph is
    ///   already queue-fed, even when the chosen input is already wired
    /// - the port and lifecycle errors of [`connect_ports`](Self::connect_ports)
    pub fn connect_queued_ports(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
        capacity: usize,
    ) -> Result<Arc<dyn DataQueue>, GraphError> {
        self.ensure_stopped()?;
        if from == to {
            return Err(TopologyFault::SelfConnection(from).into());
        }

        // Clock-domain rules first: they hold regardless of which ports are used.
        let (sa, sb) = (self.partition.of(from), self.partition.of(to));
        if let (Some(a), Some(b)) = (sa, sb) {
            if a == b {
                return Err(TopologyFault::SameSubgraph {
                    from,
                    to,
                    subgraph: a,
                }
                .into());
            }
        }
        if let Some(b) = sb {
            if self.partition.inbound(b).is_some() {
                return Err(TopologyFault::SecondInboundQueue(b).into());
            }
        }
        self.check_wiring(from, output, to, input)?;

        let bridge = match self.node_slot(from)?.port(output) {
            Some(PortMut::Output(p)) => p.queue_bridge(capacity),
            _ => return Err(GraphError::port(from, output, PortError::NoSuchPort(output))),
        };
        let queue = Arc::clone(&bridge.queue);
        let writer = self.push_slot(bridge.writer, true);
        let reader = self.push_slot(bridge.reader, true);

        // Neither call can merge subgraphs: both adapters are fresh nodes.
        self.connect_ports(from, output, writer, QueueWriter::<()>::IN)?;
        self.connect_ports(reader, QueueReader::<()>::OUT, to, input)?;

        let (Some(producer), Some(consumer)) = (self.partition.of(from), self.partition.of(to))
        else {
            return Err(GraphError::NodeUnavailable(to));
        };
        self.partition.set_inbound(consumer, Arc::clone(&queue));
        self.partition.link(producer, consumer);
        debug!(%from, %to, %producer, %consumer, capacity, "queue connected");
        Ok(queue)
    }

    // --- Controls ---

    /// Binds control port `port` of `node` to the external name `name`.
    ///
    /// Several ports may share one name; an update is then broadcast to all
    /// of them. `validator` maps each converted value before it is stored.
    ///
    /// # Errors
    ///
    /// [`GraphError::Binding`] if the port is not a `Control<T>`,
    /// [`GraphError::Frozen`] while the graph runs.
    pub fn bind<T: ControlData>(
        &mut self,
        node: NodeId,
        port: usize,
        name: impl Into<String>,
        validator: Option<Validator<T>>,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.runtime.is_some() {
            return Err(GraphError::Frozen);
        }
        let binding_error = |source| GraphError::Binding {
            name: name.clone(),
            node,
            port,
            source,
        };
        match self.node_slot(node)?.port(port) {
            Some(PortMut::Control(c)) if c.data_type() == TypeId::of::<T>() => {}
            Some(PortMut::Control(c)) => {
                return Err(binding_error(ControlError::WrongControlType {
                    expected: std::any::type_name::<T>(),
                    found: c.type_name(),
                }));
            }
            Some(_) => return Err(binding_error(ControlError::NotAControl(port))),
            None => return Err(GraphError::port(node, port, PortError::NoSuchPort(port))),
        }
        debug!(control = %name, %node, port, "control bound");
        self.bindings
            .insert(name, Binding::typed::<T>(node, port, validator));
        Ok(())
    }

    /// Removes every binding.
    ///
    /// # Errors
    ///
    /// [`GraphError::Frozen`] while the graph runs.
    pub fn unbind_all(&mut self) -> Result<(), GraphError> {
        if self.runtime.is_some() {
            return Err(GraphError::Frozen);
        }
        self.bindings.clear();
        Ok(())
    }

    /// Bound control names in sorted order.
    pub fn bound_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.names()
    }

    /// A cloneable handle that posts updates without borrowing the graph.
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle::new(&self.bindings, |node| {
            self.partition
                .of(node)
                .map(|s| (s, self.partition.sender(s)))
        })
    }

    /// Schedules named control updates on the owning subgraph threads.
    ///
    /// Updates are applied asynchronously at the top of each affected
    /// subgraph's next cycle, at most one batch per subgraph per call.
    /// Returns the number of subgraphs that received a batch.
    ///
    /// # Errors
    ///
    /// [`GraphError::InvalidControlNode`] if a bound node belongs to no
    /// subgraph; the other targets still receive their updates.
    pub fn post_updates(&self, updates: &ControlUpdates) -> Result<usize, GraphError> {
        self.control_handle().post_updates(updates)
    }

    // --- Introspection ---

    /// Current subgraph of `node`, if it has been connected.
    pub fn subgraph_of(&self, node: NodeId) -> Option<SubgraphId> {
        self.partition.of(node)
    }

    /// Returns `true` if both nodes run on the same subgraph thread.
    pub fn same_subgraph(&self, a: NodeId, b: NodeId) -> bool {
        match (self.partition.of(a), self.partition.of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Number of subgraphs that would run on [`start`](Self::start).
    pub fn subgraph_count(&self) -> usize {
        self.partition.roots().len()
    }

    /// Nodes of `subgraph`, in assignment order.
    pub fn subgraph_nodes(&self, subgraph: SubgraphId) -> &[NodeId] {
        self.partition.nodes(subgraph)
    }

    /// The queue feeding `subgraph`, if any.
    pub fn inbound_queue(&self, subgraph: SubgraphId) -> Option<Arc<dyn DataQueue>> {
        self.partition.inbound(subgraph).cloned()
    }

    /// Returns `true` between a successful [`start`](Self::start) and
    /// [`stop`](Self::stop).
    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    // --- Lifecycle ---

    /// Spawns one thread per subgraph and blocks until every node has been
    /// initialized.
    ///
    /// Every subgraph is ordered before any thread is spawned, so a failed
    /// start leaves no thread running.
    ///
    /// # Errors
    ///
    /// - [`GraphError::AlreadyRunning`] if the graph runs
    /// - [`GraphError::EmptyGraph`] if no node is connected
    /// - [`GraphError::CycleTopology`] if a subgraph contains a cycle
    /// - [`GraphError::NodeUnavailable`] if a node was lost in an earlier run
    /// - [`GraphError::Spawn`] if the OS refuses a thread
    pub fn start(&mut self) -> Result<(), GraphError> {
        if self.runtime.is_some() {
            return Err(GraphError::AlreadyRunning);
        }
        self.partition.forward_orphaned_batches();
        let subgraphs = self.partition.roots();
        if subgraphs.is_empty() {
            return Err(GraphError::EmptyGraph);
        }

        let mut plans = Vec::with_capacity(subgraphs.len());
        for subgraph in subgraphs {
            let order = topological_order(
                self.partition.nodes(subgraph),
                self.partition.edges(subgraph),
            )
            .map_err(|remaining| GraphError::CycleTopology {
                subgraph,
                remaining,
            })?;
            if let Some(&lost) = order.iter().find(|id| self.slots[id.slot()].node.is_none()) {
                return Err(GraphError::NodeUnavailable(lost));
            }
            plans.push((subgraph, order));
        }

        let runs: Vec<SubgraphRun> = plans
            .into_iter()
            .map(|(subgraph, order)| SubgraphRun {
                id: subgraph,
                nodes: order
                    .into_iter()
                    .filter_map(|id| self.slots[id.slot()].node.take().map(|n| (id, n)))
                    .collect(),
                inbound: self.partition.inbound(subgraph).cloned(),
                controls: self.partition.receiver(subgraph),
                data_wait: self.options.data_wait,
            })
            .collect();

        let state = Arc::new(RunState::new(runs.len()));
        let mut threads = Vec::with_capacity(runs.len());
        let mut pending = runs.into_iter();

        while let Some(run) = pending.next() {
            let subgraph = run.id;
            match self.spawn(run, &state) {
                Ok(handle) => threads.push((subgraph, handle)),
                Err((run, err)) => {
                    error!(%subgraph, error = %err, "failed to spawn subgraph thread");
                    self.restore(run.nodes);
                    for run in pending {
                        self.restore(run.nodes);
                    }
                    self.abort_start(&state, threads);
                    return Err(GraphError::Spawn(err));
                }
            }
        }

        state.start.wait();
        info!(subgraphs = threads.len(), "graph started");
        self.runtime = Some(Runtime { state, threads });
        Ok(())
    }

    /// Spawns `run` on its own thread, handing it back if the spawn fails.
    fn spawn(
        &self,
        run: SubgraphRun,
        state: &Arc<RunState>,
    ) -> Result<JoinHandle<OrderedNodes>, (SubgraphRun, std::io::Error)> {
        // The run travels over a channel so a refused spawn does not drop it.
        let (tx, rx) = crossbeam_channel::bounded::<SubgraphRun>(1);
        let state = Arc::clone(state);
        let name = format!("{}-{}", self.options.thread_name_prefix, run.id.index());
        let handle = thread::Builder::new().name(name).spawn(move || match rx.recv() {
            Ok(run) => run.run(&state),
            Err(_) => Vec::new(),
        });
        match handle {
            Ok(handle) => match tx.send(run) {
                Ok(()) => Ok(handle),
                Err(crossbeam_channel::SendError(run)) => Err((
                    run,
                    std::io::Error::other("subgraph thread exited before receiving its nodes"),
                )),
            },
            Err(err) => Err((run, err)),
        }
    }

    /// Releases already spawned threads after a failed start and joins them.
    fn abort_start(
        &mut self,
        state: &RunState,
        threads: Vec<(SubgraphId, JoinHandle<OrderedNodes>)>,
    ) {
        state.stop.reset(threads.len());
        state.request_stop();
        state.start.open();
        state.stop.wait();
        self.join(threads);
    }

    /// Signals every subgraph thread to stop and blocks until all nodes have
    /// been destroyed and all threads joined. No-op when stopped.
    pub fn stop(&mut self) {
        let Some(Runtime { state, threads }) = self.runtime.take() else {
            return;
        };
        state.request_stop();
        state.stop.wait();
        self.join(threads);
        info!("graph stopped");
    }

    fn join(&mut self, threads: Vec<(SubgraphId, JoinHandle<OrderedNodes>)>) {
        for (subgraph, handle) in threads {
            match handle.join() {
                Ok(nodes) => self.restore(nodes),
                Err(_) => error!(%subgraph, "subgraph thread panicked; its nodes are lost"),
            }
        }
    }

    fn restore(&mut self, nodes: OrderedNodes) {
        for (id, node) in nodes {
            if let Some(slot) = self.slots.get_mut(id.slot()) {
                slot.node = Some(node);
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.slots.len())
            .field("subgraphs", &self.partition.roots().len())
            .field("running", &self.runtime.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
