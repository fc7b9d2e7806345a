//! The per-subgraph thread loop.
//!
//! ```text
//! init all ─ start latch ─┬─ drain control batches
//!                         ├─ wait ≤ data_wait for inbound data (if any)
//!                         ├─ reset all, process all (topological order)
//!                         └─ repeat until stopping
//!                         stop latch ─ destroy all ─ hand nodes back
//! ```
//!
//! Faults and panics from node lifecycle calls are logged and contained.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, error, info_span, warn};

use super::binding::ControlBatch;
use super::partition::SubgraphId;
use crate::error::{NodeError, NodeResult, panic_message};
use crate::latch::Latch;
use crate::node::{Node, NodeId};
use crate::queue::DataQueue;

/// Nodes of one subgraph in execution order.
pub(crate) type OrderedNodes = Vec<(NodeId, Box<dyn Node>)>;

/// State shared by the controlling thread and every subgraph thread.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub(crate) stopping: AtomicBool,
    pub(crate) start: Latch,
    pub(crate) stop: Latch,
}

impl RunState {
    pub(crate) fn new(threads: usize) -> Self {
        let state = Self::default();
        state.start.reset(threads);
        state.stop.reset(threads);
        state
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn request_stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Init,
    Reset,
    Process,
    Destroy,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Reset => "reset",
            Phase::Process => "process",
            Phase::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Arrives at the stop latch when dropped, unless already arrived.
///
/// Keeps `Graph::stop` from waiting forever on a thread that unwound.
struct StopArrival<'a> {
    latch: &'a Latch,
    arrived: bool,
}

impl StopArrival<'_> {
    fn arrive_and_wait(&mut self) {
        if !self.arrived {
            self.arrived = true;
            self.latch.arrive_and_wait();
        }
    }
}

impl Drop for StopArrival<'_> {
    fn drop(&mut self) {
        if !self.arrived {
            error!("subgraph thread unwound, releasing the stop latch");
            self.arrive_and_wait();
        }
    }
}

/// Everything a subgraph thread owns for one run.
pub(crate) struct SubgraphRun {
    pub(crate) id: SubgraphId,
    pub(crate) nodes: OrderedNodes,
    pub(crate) inbound: Option<Arc<dyn DataQueue>>,
    pub(crate) controls: Receiver<ControlBatch>,
    pub(crate) data_wait: Duration,
}

impl SubgraphRun {
    /// Runs the subgraph until `state` requests a stop and returns its nodes.
    pub(crate) fn run(mut self, state: &RunState) -> OrderedNodes {
        let span = info_span!("subgraph", id = self.id.index());
        let _guard = span.enter();

        debug!(nodes = self.nodes.len(), queued = self.inbound.is_some(), "initializing");
        self.each(Phase::Init);
        state.start.arrive_and_wait();

        let index: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();
        let mut cycles = 0u64;
        let mut stop = StopArrival {
            latch: &state.stop,
            arrived: false,
        };

        while !state.is_stopping() {
            for batch in self.controls.try_iter() {
                batch.apply(self.id, &mut self.nodes, &index);
            }
            if let Some(queue) = &self.inbound {
                if !queue.wait_for_data(self.data_wait) {
                    continue;
                }
            }
            self.each(Phase::Reset);
            self.each(Phase::Process);
            cycles += 1;
        }

        stop.arrive_and_wait();
        debug!(cycles, "stopping");
        self.each(Phase::Destroy);
        self.nodes
    }

    fn each(&mut self, phase: Phase) {
        for (id, node) in &mut self.nodes {
            match call(node.as_mut(), phase) {
                Ok(()) => {}
                Err(e @ NodeError::Panicked(_)) => {
                    error!(node = %id, name = node.name(), %phase, error = %e, "node panicked");
                }
                Err(e) => warn!(node = %id, name = node.name(), %phase, error = %e, "node fault"),
            }
        }
    }
}

fn call(node: &mut dyn Node, phase: Phase) -> NodeResult {
    let result = catch_unwind(AssertUnwindSafe(|| match phase {
        Phase::Init => node.init(),
        Phase::Reset => node.reset(),
        Phase::Process => node.process(),
        Phase::Destroy => node.destroy(),
    }));
    result.unwrap_or_else(|payload| Err(NodeError::Panicked(panic_message(payload.as_ref()))))
}
