//! Bounded cross-thread queue.
//!
//! [`Queue<T>`] is the only steady-state data channel between subgraphs. It
//! carries `Arc<T>` items so a producer hands over ownership without copying.
//! Two push policies exist:
//!
//! - [`Queue::push`] never blocks and never fails. When full it evicts the
//!   oldest item and reports it through [`LossyPush::EvictedOldest`].
//! - [`Queue::try_push`] rejects the item when full.
//!
//! Observers are notified once on each empty→non-empty transition, outside
//! the data lock. An observer must therefore drain in a loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::QueueError;

/// Outcome of a lossy [`Queue::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an evicted item means data was dropped"]
pub enum LossyPush<T> {
    /// The item was appended without loss.
    Stored,
    /// The queue was full; the oldest item was discarded to make room.
    EvictedOldest(Arc<T>),
}

impl<T> LossyPush<T> {
    /// Returns `true` if an item was discarded.
    pub fn is_lossy(&self) -> bool {
        matches!(self, LossyPush::EvictedOldest(_))
    }
}

/// Callback fired when a queue goes from empty to non-empty.
pub trait QueueObserver: Send + Sync {
    /// Called outside the queue lock.
    fn data_available(&self);
}

impl<F: Fn() + Send + Sync> QueueObserver for F {
    fn data_available(&self) {
        self()
    }
}

/// Queue operations that do not depend on the item type.
pub trait DataQueue: Send + Sync + fmt::Debug + fmt::Display {
    /// Blocks until the queue is non-empty or `timeout` elapses.
    fn wait_for_data(&self, timeout: Duration) -> bool;
    /// Number of queued items.
    fn len(&self) -> usize;
    /// Fixed capacity.
    fn capacity(&self) -> usize;
    /// Returns `true` if no item is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded FIFO of shared items.
pub struct Queue<T> {
    items: Mutex<VecDeque<Arc<T>>>,
    ready: Condvar,
    observers: Mutex<Vec<Arc<dyn QueueObserver>>>,
    capacity: usize,
}

impl<T: Send + Sync + 'static> Queue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            observers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Appends `item`, evicting the oldest item when full.
    pub fn push(&self, item: T) -> LossyPush<T> {
        self.push_shared(Arc::new(item))
    }

    /// Appends a shared item, evicting the oldest item when full.
    pub fn push_shared(&self, item: Arc<T>) -> LossyPush<T> {
        let (outcome, was_empty) = {
            let mut items = self.items.lock();
            let was_empty = items.is_empty();
            let outcome = if items.len() >= self.capacity {
                items.pop_front().map_or(LossyPush::Stored, LossyPush::EvictedOldest)
            } else {
                LossyPush::Stored
            };
            items.push_back(item);
            (outcome, was_empty)
        };
        self.ready.notify_all();
        if was_empty {
            self.notify_observers();
        }
        outcome
    }

    /// Appends `item` unless the queue is full.
    pub fn try_push(&self, item: T) -> bool {
        self.try_push_shared(Arc::new(item)).is_ok()
    }

    /// Appends a shared item unless the queue is full.
    ///
    /// # Errors
    ///
    /// Hands the item back when the queue is full.
    pub fn try_push_shared(&self, item: Arc<T>) -> Result<(), Arc<T>> {
        let was_empty = {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                return Err(item);
            }
            let was_empty = items.is_empty();
            items.push_back(item);
            was_empty
        };
        self.ready.notify_all();
        if was_empty {
            self.notify_observers();
        }
        Ok(())
    }

    /// Removes the oldest item without blocking.
    pub fn try_pop(&self) -> Option<Arc<T>> {
        self.items.lock().pop_front()
    }

    /// Blocks until the queue is non-empty or `timeout` elapses.
    ///
    /// Returns whether data is present.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let mut items = self.items.lock();
        if items.is_empty() {
            // wait_while_for handles spurious wakeups and keeps the deadline.
            self.ready
                .wait_while_for(&mut items, |items| items.is_empty(), timeout);
        }
        !items.is_empty()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Returns `true` if a further `try_push` would be rejected.
    pub fn is_full(&self) -> bool {
        self.items.lock().len() >= self.capacity
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registers an observer.
    ///
    /// # Errors
    ///
    /// [`QueueError::AlreadyObserving`] if the same observer is registered.
    pub fn add_observer(&self, observer: Arc<dyn QueueObserver>) -> Result<(), QueueError> {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return Err(QueueError::AlreadyObserving);
        }
        observers.push(observer);
        Ok(())
    }

    /// Unregisters an observer.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotObserving`] if the observer is not registered.
    pub fn remove_observer(&self, observer: &Arc<dyn QueueObserver>) -> Result<(), QueueError> {
        let mut observers = self.observers.lock();
        let pos = observers
            .iter()
            .position(|o| same_observer(o, observer))
            .ok_or(QueueError::NotObserving)?;
        observers.remove(pos);
        Ok(())
    }

    fn notify_observers(&self) {
        let observers: Vec<_> = self.observers.lock().iter().map(Arc::clone).collect();
        for observer in observers {
            observer.data_available();
        }
    }
}

fn same_observer(a: &Arc<dyn QueueObserver>, b: &Arc<dyn QueueObserver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl<T: Send + Sync + 'static> DataQueue for Queue<T> {
    fn wait_for_data(&self, timeout: Duration) -> bool {
        Queue::wait_for_data(self, timeout)
    }

    fn len(&self) -> usize {
        Queue::len(self)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Display for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queue<{}> size={} capacity={}",
            std::any::type_name::<T>(),
            self.items.lock().len(),
            self.capacity
        )
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("type", &std::any::type_name::<T>())
            .field("len", &self.items.lock().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    #[test]
    fn try_push_rejects_when_full() {
        let q = Queue::new(4);
        for i in 0..4 {
            assert!(q.try_push(i));
        }
        assert!(!q.try_push(4));
        assert_eq!(q.len(), 4);
        assert!(q.is_full());
        let drained: Vec<i32> = std::iter::from_fn(|| q.try_pop()).map(|v| *v).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn try_push_shared_hands_item_back() {
        let q = Queue::new(1);
        q.try_push_shared(Arc::new(1)).unwrap();
        let rejected = Arc::new(2);
        let back = q.try_push_shared(Arc::clone(&rejected)).unwrap_err();
        assert!(Arc::ptr_eq(&back, &rejected));
    }

    #[test]
    fn push_evicts_oldest() {
        let q = Queue::new(4);
        for i in 0..4 {
            assert_eq!(q.push(i), LossyPush::Stored);
        }
        match q.push(4) {
            LossyPush::EvictedOldest(old) => assert_eq!(*old, 0),
            LossyPush::Stored => panic!("expected eviction"),
        }
        let drained: Vec<i32> = std::iter::from_fn(|| q.try_pop()).map(|v| *v).collect();
        assert_eq!(drained, vec![1, 2, 3, 4]);
    }

    #[test]
    fn wait_for_data_times_out_when_empty() {
        let q = Queue::<u8>::new(2);
        let t0 = Instant::now();
        assert!(!q.wait_for_data(Duration::from_millis(50)));
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_millis(45), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[test]
    fn wait_for_data_returns_immediately_when_present() {
        let q = Queue::new(2);
        assert!(!q.push(1u8).is_lossy());
        let t0 = Instant::now();
        assert!(q.wait_for_data(Duration::from_secs(5)));
        assert!(t0.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_for_data_wakes_on_push() {
        let q = Arc::new(Queue::new(2));
        let producer = Arc::clone(&q);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(producer.try_push(9u32));
        });
        assert!(q.wait_for_data(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn observers_fire_on_empty_transition_only() {
        let q = Queue::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let observer: Arc<dyn QueueObserver> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        q.add_observer(Arc::clone(&observer)).unwrap();

        assert!(q.try_push(1));
        assert!(q.try_push(2));
        assert!(!q.push(3).is_lossy());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        while q.try_pop().is_some() {}
        assert!(q.try_push(4));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        q.remove_observer(&observer).unwrap();
        while q.try_pop().is_some() {}
        assert!(q.try_push(5));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observer_registry_errors() {
        let q = Queue::<u8>::new(1);
        let observer: Arc<dyn QueueObserver> = Arc::new(|| {});
        assert_eq!(q.remove_observer(&observer), Err(QueueError::NotObserving));
        q.add_observer(Arc::clone(&observer)).unwrap();
        assert_eq!(
            q.add_observer(Arc::clone(&observer)),
            Err(QueueError::AlreadyObserving)
        );
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let q = Queue::new(0);
        assert_eq!(q.capacity(), 1);
        assert!(q.try_push(()));
    }

    #[test]
    fn display_reports_type_and_size() {
        let q = Queue::new(3);
        assert!(q.try_push(1u16));
        assert_eq!(q.to_string(), "Queue<u16> size=1 capacity=3");
    }
}
