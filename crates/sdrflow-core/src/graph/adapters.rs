//! Queue adapter nodes.
//!
//! [`Graph::connect_queued`](super::Graph::connect_queued) splits a
//! connection at a thread boundary into
//!
//! ```text
//! producer → QueueWriter ══ Queue ══ QueueReader → consumer
//! ```
//!
//! with the writer in the producer's subgraph and the reader in the
//! consumer's. Both nodes are public so collaborators can feed or drain
//! queues they own, e.g. a streaming layer reading encoded frames.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::NodeResult;
use crate::node::Node;
use crate::port::{Input, Output, PortData, PortMut};
use crate::queue::{DataQueue, Queue};

/// Pops one queued item per cycle into its output.
pub struct QueueReader<T> {
    queue: Arc<Queue<T>>,
    output: Output<T>,
}

impl<T: PortData> QueueReader<T> {
    /// Port index of the output.
    pub const OUT: usize = 0;

    /// Creates a reader draining `queue`.
    pub fn new(queue: Arc<Queue<T>>) -> Self {
        Self {
            queue,
            output: Output::new(),
        }
    }

    /// The drained queue.
    pub fn queue(&self) -> &Arc<Queue<T>> {
        &self.queue
    }
}

impl<T: PortData> Node for QueueReader<T> {
    fn name(&self) -> &str {
        "queue-reader"
    }

    fn port_count(&self) -> usize {
        1
    }

    fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
        match index {
            Self::OUT => Some(PortMut::from(&mut self.output)),
            _ => None,
        }
    }

    fn process(&mut self) -> NodeResult {
        match self.queue.try_pop() {
            Some(item) => self.output.store_shared(item)?,
            None => debug!(queue = %self.queue, "queue is empty"),
        }
        Ok(())
    }
}

/// Pushes its inputs into a queue, dropping items the queue rejects.
///
/// Besides the single-item input, a batch input of `Vec<T>` pushes every
/// item in order and stops at the first rejection.
pub struct QueueWriter<T> {
    queue: Arc<Queue<T>>,
    input: Input<T>,
    batch: Input<Vec<T>>,
}

impl<T: PortData> QueueWriter<T> {
    /// Port index of the single-item input.
    pub const IN: usize = 0;
    /// Port index of the batch input.
    pub const IN_BATCH: usize = 1;

    /// Creates a writer feeding `queue`.
    pub fn new(queue: Arc<Queue<T>>) -> Self {
        Self {
            queue,
            input: Input::new(),
            batch: Input::new(),
        }
    }

    /// The fed queue.
    pub fn queue(&self) -> &Arc<Queue<T>> {
        &self.queue
    }
}

impl<T: PortData> Node for QueueWriter<T> {
    fn name(&self) -> &str {
        "queue-writer"
    }

    fn port_count(&self) -> usize {
        2
    }

    fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
        match index {
            Self::IN => Some(PortMut::from(&mut self.input)),
            Self::IN_BATCH => Some(PortMut::from(&mut self.batch)),
            _ => None,
        }
    }

    fn process(&mut self) -> NodeResult {
        if let Ok(item) = self.input.read() {
            if self.queue.try_push_shared(item).is_err() {
                warn!(queue = %self.queue, "queue is full, discarding data");
            }
        }

        if let Ok(batch) = self.batch.read() {
            for (i, item) in batch.iter().enumerate() {
                if !self.queue.try_push(item.clone()) {
                    warn!(
                        queue = %self.queue,
                        dropped = batch.len() - i,
                        "queue is full, discarding data"
                    );
                    break;
                }
            }
        }
        Ok(())
    }
}

/// A queue with its writer and reader, ready to be inserted into a graph.
pub struct QueueBridge {
    pub(crate) writer: Box<dyn Node>,
    pub(crate) reader: Box<dyn Node>,
    pub(crate) queue: Arc<dyn DataQueue>,
}

impl QueueBridge {
    pub(crate) fn new<T: PortData>(capacity: usize) -> Self {
        let queue = Arc::new(Queue::<T>::new(capacity));
        Self {
            writer: Box::new(QueueWriter::new(Arc::clone(&queue))),
            reader: Box::new(QueueReader::new(Arc::clone(&queue))),
            queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{InputPort, OutputPort};

    #[test]
    fn reader_publishes_popped_item() {
        let queue = Arc::new(Queue::new(4));
        assert!(queue.try_push(7u32));
        let mut reader = QueueReader::new(Arc::clone(&queue));
        reader.process().unwrap();
        assert_eq!(*reader.output.value().unwrap(), 7);
        assert!(queue.is_empty());
    }

    #[test]
    fn reader_on_empty_queue_produces_nothing() {
        let queue = Arc::new(Queue::<u32>::new(4));
        let mut reader = QueueReader::new(queue);
        reader.process().unwrap();
        assert!(!reader.output.is_set());
    }

    #[test]
    fn writer_drops_item_when_full() {
        let queue = Arc::new(Queue::<u32>::new(1));
        let mut writer = QueueWriter::new(Arc::clone(&queue));
        let mut source = Output::<u32>::new();
        writer.input.attach(source.shared_cell()).unwrap();

        source.store(1).unwrap();
        writer.process().unwrap();
        source.reset();
        source.store(2).unwrap();
        writer.process().unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(*queue.try_pop().unwrap(), 1);
    }

    #[test]
    fn batch_stops_at_first_rejection() {
        let queue = Arc::new(Queue::new(3));
        let mut writer = QueueWriter::new(Arc::clone(&queue));
        let mut source = Output::<Vec<u32>>::new();
        writer.batch.attach(source.shared_cell()).unwrap();

        source.store(vec![1, 2, 3, 4, 5]).unwrap();
        writer.process().unwrap();

        let drained: Vec<u32> = std::iter::from_fn(|| queue.try_pop()).map(|v| *v).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn unconnected_writer_is_idle() {
        let queue = Arc::new(Queue::<u8>::new(1));
        let mut writer = QueueWriter::new(Arc::clone(&queue));
        writer.process().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn bridge_shares_one_queue() {
        let mut bridge = QueueBridge::new::<f32>(8);
        assert_eq!(bridge.queue.capacity(), 8);
        let Some(PortMut::Input(input)) = bridge.writer.port(QueueWriter::<f32>::IN) else {
            panic!("writer input missing");
        };
        assert_eq!(input.type_name(), "f32");
        let Some(PortMut::Output(output)) = bridge.reader.port(QueueReader::<f32>::OUT) else {
            panic!("reader output missing");
        };
        assert!(!output.is_set());
    }
}
