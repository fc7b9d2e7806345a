//! Typed node ports.
//!
//! A node owns a fixed set of ports:
//!
//! - [`Output<T>`]: a slot written at most once per cycle and cleared by
//!   `reset()`. Downstream inputs read through the same shared cell, so a
//!   value is never copied between nodes of one subgraph.
//! - [`Input<T>`]: an optional reference to an upstream output cell, bound
//!   once at connect time.
//! - [`Control<T>`]: an externally settable parameter with at most one
//!   observer callback.
//!
//! The graph manipulates ports of unknown data type through the
//! [`InputPort`], [`OutputPort`] and [`ControlPort`] traits, reached via
//! [`PortMut`] from [`Node::port`](crate::node::Node::port).

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::PortError;
use crate::graph::adapters::QueueBridge;
use crate::value::{ControlData, ControlValue};

/// Bound for data carried between nodes.
pub trait PortData: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> PortData for T {}

type Cell<T> = Arc<ArcSwapOption<T>>;

/// The kind of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// Reads an upstream output.
    Input,
    /// Publishes a value once per cycle.
    Output,
    /// Externally settable parameter.
    Control,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortKind::Input => "input",
            PortKind::Output => "output",
            PortKind::Control => "control",
        };
        f.write_str(name)
    }
}

/// Output cell of unknown data type, handed from an output to an input.
pub struct SharedCell {
    cell: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl SharedCell {
    fn new<T: PortData>(cell: Cell<T>) -> Self {
        Self {
            cell: Box::new(cell),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the data type carried by the cell.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for SharedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCell")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Single-assignment-per-cycle output slot.
pub struct Output<T> {
    cell: Cell<T>,
}

impl<T: PortData> Output<T> {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Publishes `value` for this cycle.
    ///
    /// # Errors
    ///
    /// [`PortError::AlreadySet`] if a value was stored since the last reset.
    pub fn store(&mut self, value: T) -> Result<(), PortError> {
        self.store_shared(Arc::new(value))
    }

    /// Publishes an already shared value without copying it.
    ///
    /// # Errors
    ///
    /// [`PortError::AlreadySet`] if a value was stored since the last reset.
    pub fn store_shared(&mut self, value: Arc<T>) -> Result<(), PortError> {
        if self.cell.load().is_some() {
            return Err(PortError::AlreadySet);
        }
        self.cell.store(Some(value));
        Ok(())
    }

    /// Clears the stored value.
    pub fn reset(&mut self) {
        self.cell.store(None);
    }

    /// Returns `true` if a value was stored this cycle.
    pub fn is_set(&self) -> bool {
        self.cell.load().is_some()
    }

    /// Returns the value stored this cycle, if any.
    pub fn value(&self) -> Option<Arc<T>> {
        self.cell.load_full()
    }
}

impl<T: PortData> Default for Output<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("type", &std::any::type_name::<T>())
            .field("set", &self.cell.load().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Reference to an upstream output cell.
pub struct Input<T> {
    source: Option<Cell<T>>,
}

impl<T: PortData> Input<T> {
    /// Creates an unconnected input.
    pub fn new() -> Self {
        Self { source: None }
    }

    /// Returns the upstream value for this cycle.
    ///
    /// # Errors
    ///
    /// [`PortError::Unconnected`] if the input was never wired,
    /// [`PortError::NoData`] if the upstream output is empty this cycle.
    pub fn read(&self) -> Result<Arc<T>, PortError> {
        let source = self.source.as_ref().ok_or(PortError::Unconnected)?;
        source.load_full().ok_or(PortError::NoData)
    }

    /// Returns whether the upstream output holds a value this cycle.
    ///
    /// # Errors
    ///
    /// [`PortError::Unconnected`] if the input was never wired.
    pub fn has_data(&self) -> Result<bool, PortError> {
        let source = self.source.as_ref().ok_or(PortError::Unconnected)?;
        Ok(source.load().is_some())
    }

    /// Returns `true` once the input is wired to an output.
    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }
}

impl<T: PortData> Default for Input<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("type", &std::any::type_name::<T>())
            .field("connected", &self.source.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

type Observer<T> = Box<dyn FnMut(&T) + Send>;

/// Externally settable node parameter.
///
/// Only the thread that owns the node's subgraph mutates a control while the
/// graph runs; external writers go through
/// [`Graph::post_updates`](crate::graph::Graph::post_updates).
pub struct Control<T> {
    value: T,
    observer: Option<Observer<T>>,
}

impl<T: ControlData> Control<T> {
    /// Creates a control holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            observer: None,
        }
    }

    /// Current value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Stores `value` and notifies the observer, if any.
    pub fn set(&mut self, value: T) {
        self.value = value;
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.value);
        }
    }

    /// Registers the observer callback.
    ///
    /// # Errors
    ///
    /// [`PortError::AlreadyObserving`] if an observer is already registered.
    pub fn observe(&mut self, observer: impl FnMut(&T) + Send + 'static) -> Result<(), PortError> {
        if self.observer.is_some() {
            return Err(PortError::AlreadyObserving);
        }
        self.observer = Some(Box::new(observer));
        Ok(())
    }

    /// Removes the observer callback.
    ///
    /// # Errors
    ///
    /// [`PortError::NotObserving`] if no observer is registered.
    pub fn unobserve(&mut self) -> Result<(), PortError> {
        self.observer.take().map(|_| ()).ok_or(PortError::NotObserving)
    }

    /// Returns `true` if an observer is registered.
    pub fn is_observed(&self) -> bool {
        self.observer.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Control<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("value", &self.value)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Type-erased access
// ---------------------------------------------------------------------------

/// Input port of unknown data type.
pub trait InputPort: Send {
    /// [`TypeId`] of the carried data.
    fn data_type(&self) -> TypeId;
    /// Name of the carried data type.
    fn type_name(&self) -> &'static str;
    /// Returns `true` once wired.
    fn is_connected(&self) -> bool;
    /// Wires the input to an upstream cell.
    ///
    /// # Errors
    ///
    /// [`PortError::AlreadyConnected`] if already wired,
    /// [`PortError::TypeMismatch`] if the cell carries another type.
    fn attach(&mut self, cell: SharedCell) -> Result<(), PortError>;
}

/// Output port of unknown data type.
pub trait OutputPort: Send {
    /// [`TypeId`] of the carried data.
    fn data_type(&self) -> TypeId;
    /// Name of the carried data type.
    fn type_name(&self) -> &'static str;
    /// Returns `true` if a value was stored this cycle.
    fn is_set(&self) -> bool;
    /// Clears the stored value.
    fn clear(&mut self);
    /// Shares the output cell with a downstream input.
    fn shared_cell(&self) -> SharedCell;
    /// Builds a queue of this port's data type with its adapter nodes.
    fn queue_bridge(&self, capacity: usize) -> QueueBridge;
}

/// Control port of unknown data type.
pub trait ControlPort: Send {
    /// [`TypeId`] of the held value.
    fn data_type(&self) -> TypeId;
    /// Name of the held value's type.
    fn type_name(&self) -> &'static str;
    /// Downcast access for typed setters.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Current value as a [`ControlValue`].
    fn value(&self) -> ControlValue;
}

impl<T: PortData> InputPort for Input<T> {
    fn data_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_connected(&self) -> bool {
        self.source.is_some()
    }

    fn attach(&mut self, cell: SharedCell) -> Result<(), PortError> {
        if self.source.is_some() {
            return Err(PortError::AlreadyConnected);
        }
        let found = cell.type_name;
        let cell = cell
            .cell
            .downcast::<Cell<T>>()
            .map_err(|_| PortError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found,
            })?;
        self.source = Some(*cell);
        Ok(())
    }
}

impl<T: PortData> OutputPort for Output<T> {
    fn data_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_set(&self) -> bool {
        Output::is_set(self)
    }

    fn clear(&mut self) {
        self.reset();
    }

    fn shared_cell(&self) -> SharedCell {
        SharedCell::new(Arc::clone(&self.cell))
    }

    fn queue_bridge(&self, capacity: usize) -> QueueBridge {
        QueueBridge::new::<T>(capacity)
    }
}

impl<T: ControlData> ControlPort for Control<T> {
    fn data_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value(&self) -> ControlValue {
        self.value.clone().into_value()
    }
}

/// Mutable access to one port of a node.
pub enum PortMut<'a> {
    /// An input port.
    Input(&'a mut dyn InputPort),
    /// An output port.
    Output(&'a mut dyn OutputPort),
    /// A control port.
    Control(&'a mut dyn ControlPort),
}

impl PortMut<'_> {
    /// Kind of the port.
    pub fn kind(&self) -> PortKind {
        match self {
            PortMut::Input(_) => PortKind::Input,
            PortMut::Output(_) => PortKind::Output,
            PortMut::Control(_) => PortKind::Control,
        }
    }

    /// Name of the data type carried or held by the port.
    pub fn type_name(&self) -> &'static str {
        match self {
            PortMut::Input(p) => p.type_name(),
            PortMut::Output(p) => p.type_name(),
            PortMut::Control(p) => p.type_name(),
        }
    }
}

impl<'a, T: PortData> From<&'a mut Input<T>> for PortMut<'a> {
    fn from(port: &'a mut Input<T>) -> Self {
        PortMut::Input(port)
    }
}

impl<'a, T: PortData> From<&'a mut Output<T>> for PortMut<'a> {
    fn from(port: &'a mut Output<T>) -> Self {
        PortMut::Output(port)
    }
}

impl<'a, T: ControlData> From<&'a mut Control<T>> for PortMut<'a> {
    fn from(port: &'a mut Control<T>) -> Self {
        PortMut::Control(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn wired() -> (Output<u32>, Input<u32>) {
        let out = Output::<u32>::new();
        let mut input = Input::<u32>::new();
        input.attach(out.shared_cell()).unwrap();
        (out, input)
    }

    #[test]
    fn store_twice_fails_until_reset() {
        let mut out = Output::new();
        out.store(1u32).unwrap();
        assert_eq!(out.store(2), Err(PortError::AlreadySet));
        out.reset();
        out.store(3).unwrap();
        assert_eq!(*out.value().unwrap(), 3);
    }

    #[test]
    fn input_reads_upstream_without_copy() {
        let (mut out, input) = wired();
        let shared = Arc::new(42u32);
        out.store_shared(Arc::clone(&shared)).unwrap();
        let read = input.read().unwrap();
        assert!(Arc::ptr_eq(&read, &shared));
    }

    #[test]
    fn input_errors() {
        let input = Input::<u32>::new();
        assert_eq!(input.read(), Err(PortError::Unconnected));
        assert_eq!(input.has_data(), Err(PortError::Unconnected));

        let (mut out, input) = wired();
        assert_eq!(input.read(), Err(PortError::NoData));
        assert_eq!(input.has_data(), Ok(false));
        out.store(5).unwrap();
        assert_eq!(input.has_data(), Ok(true));
        out.reset();
        assert_eq!(input.read(), Err(PortError::NoData));
    }

    #[test]
    fn attach_twice_fails() {
        let (out, mut input) = wired();
        assert_eq!(
            input.attach(out.shared_cell()),
            Err(PortError::AlreadyConnected)
        );
    }

    #[test]
    fn attach_wrong_type_fails() {
        let out = Output::<f32>::new();
        let mut input = Input::<u32>::new();
        let err = input.attach(out.shared_cell()).unwrap_err();
        assert!(matches!(err, PortError::TypeMismatch { found: "f32", .. }));
        assert!(!input.is_connected());
    }

    #[test]
    fn control_observer_fires_on_set() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ctl = Control::new(1.0f64);
        ctl.observe(move |v| sink.lock().unwrap().push(*v)).unwrap();
        ctl.set(2.5);
        assert_eq!(*ctl.value(), 2.5);
        assert_eq!(*seen.lock().unwrap(), vec![2.5]);
    }

    #[test]
    fn control_observer_registry() {
        let mut ctl = Control::new(0u32);
        assert_eq!(ctl.unobserve(), Err(PortError::NotObserving));
        ctl.observe(|_| {}).unwrap();
        assert_eq!(ctl.observe(|_| {}), Err(PortError::AlreadyObserving));
        ctl.unobserve().unwrap();
        assert!(!ctl.is_observed());
        ctl.set(4);
        assert_eq!(ctl.value, 4);
    }

    #[test]
    fn port_mut_reports_kind() {
        let mut ctl = Control::new(true);
        let port = PortMut::from(&mut ctl);
        assert_eq!(port.kind(), PortKind::Control);
        assert_eq!(port.type_name(), "bool");
        if let PortMut::Control(c) = port {
            assert_eq!(c.value(), ControlValue::Bool(true));
        }
    }
}
