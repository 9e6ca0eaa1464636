//! # Per-cell mailboxes.
//!
//! Every cell owns one [`EventQueue`]: any number of producers push into it,
//! exactly one consumer (the cell's backend loop) pops from it.
//!
//! ## Contract
//! - [`push`](EventQueue::push) is non-blocking and reports `QueueFull` on a
//!   saturated bounded queue, `QueueStopped` after [`stop`](EventQueue::stop).
//! - [`pop`](EventQueue::pop) yields events in FIFO order as observed by any
//!   single producer; there is no ordering guarantee between distinct
//!   producers. After `stop` it returns `None`.
//! - [`stop`](EventQueue::stop) is idempotent. Any in-flight `push` completes
//!   in bounded time.
//!
//! Queues are factory-constructed per cell; the environment owns the
//! [`QueueFactory`]. The default builds a [`BoundedQueue`] with
//! [`Config::queue_capacity`](crate::Config::queue_capacity).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::CellError;

use super::event::Event;

/// Mailbox contract between producers and a cell's backend loop.
#[async_trait]
pub trait EventQueue: Send + Sync + 'static {
    /// Enqueues an event without blocking.
    fn push(&self, event: Event) -> Result<(), CellError>;

    /// Dequeues the next event; `None` signals end of sequence after `stop`.
    ///
    /// Must be called by exactly one consumer.
    async fn pop(&self) -> Option<Event>;

    /// Stops the queue; idempotent. Pending events are discarded.
    fn stop(&self) -> Result<(), CellError>;

    /// True once the queue has been stopped.
    fn is_stopped(&self) -> bool;
}

/// Builds the mailbox for a starting cell.
pub type QueueFactory = Arc<dyn Fn(&Config) -> Arc<dyn EventQueue> + Send + Sync>;

/// The factory used when an environment is built without an explicit one.
pub(crate) fn default_queue_factory() -> QueueFactory {
    Arc::new(|cfg: &Config| Arc::new(BoundedQueue::new(cfg.queue_capacity)) as Arc<dyn EventQueue>)
}

/// Bounded FIFO mailbox backed by a tokio mpsc channel.
///
/// Capacity is fixed at construction. Once stopped, pushes fail with
/// `QueueStopped` and the consumer observes `None`; events still buffered at
/// that point are dropped.
pub struct BoundedQueue {
    capacity: usize,
    tx: mpsc::Sender<Event>,
    rx: Mutex<mpsc::Receiver<Event>>,
    stopped: CancellationToken,
}

impl BoundedQueue {
    /// Creates a queue holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            tx,
            rx: Mutex::new(rx),
            stopped: CancellationToken::new(),
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl EventQueue for BoundedQueue {
    fn push(&self, event: Event) -> Result<(), CellError> {
        if self.stopped.is_cancelled() {
            return Err(CellError::QueueStopped);
        }
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CellError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => CellError::QueueStopped,
        })
    }

    async fn pop(&self) -> Option<Event> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.stopped.cancelled() => None,
            event = rx.recv() => event,
        }
    }

    fn stop(&self) -> Result<(), CellError> {
        self.stopped.cancel();
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

/// Unbounded FIFO mailbox.
///
/// Exists for tests and tooling; production cells should prefer
/// [`BoundedQueue`] so misbehaving producers see backpressure instead of
/// growing the heap.
pub struct UnboundedQueue {
    tx: mpsc::UnboundedSender<Event>,
    rx: Mutex<mpsc::UnboundedReceiver<Event>>,
    stopped: CancellationToken,
}

impl UnboundedQueue {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            stopped: CancellationToken::new(),
        }
    }
}

impl Default for UnboundedQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventQueue for UnboundedQueue {
    fn push(&self, event: Event) -> Result<(), CellError> {
        if self.stopped.is_cancelled() {
            return Err(CellError::QueueStopped);
        }
        self.tx.send(event).map_err(|_| CellError::QueueStopped)
    }

    async fn pop(&self) -> Option<Event> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.stopped.cancelled() => None,
            event = rx.recv() => event,
        }
    }

    fn stop(&self) -> Result<(), CellError> {
        self.stopped.cancel();
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.stopped.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::payload::Scene;

    fn event(topic: &str, n: i64) -> Event {
        Event::new(topic, n, Scene::none()).unwrap()
    }

    #[tokio::test]
    async fn pops_in_push_order() {
        let queue = BoundedQueue::new(8);
        for n in 0..5 {
            queue.push(event("seq", n)).unwrap();
        }
        for n in 0..5 {
            let got = queue.pop().await.unwrap();
            assert_eq!(got.payload().default_value().unwrap().as_int(), Some(n));
        }
    }

    #[tokio::test]
    async fn saturated_queue_rejects_pushes() {
        let queue = BoundedQueue::new(2);
        queue.push(event("a", 1)).unwrap();
        queue.push(event("a", 2)).unwrap();
        assert!(matches!(
            queue.push(event("a", 3)),
            Err(CellError::QueueFull)
        ));
    }

    #[tokio::test]
    async fn stop_ends_the_sequence_and_rejects_pushes() {
        let queue = BoundedQueue::new(4);
        queue.push(event("a", 1)).unwrap();
        queue.stop().unwrap();

        assert!(queue.is_stopped());
        assert!(queue.pop().await.is_none());
        assert!(matches!(
            queue.push(event("a", 2)),
            Err(CellError::QueueStopped)
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let queue = BoundedQueue::new(1);
        queue.stop().unwrap();
        queue.stop().unwrap();
        assert!(queue.is_stopped());
    }

    #[tokio::test]
    async fn pop_wakes_on_stop_while_waiting() {
        let queue = Arc::new(BoundedQueue::new(1));
        let popper = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::task::yield_now().await;
        queue.stop().unwrap();
        assert!(popper.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unbounded_queue_never_reports_full() {
        let queue = UnboundedQueue::new();
        for n in 0..10_000 {
            queue.push(event("burst", n)).unwrap();
        }
        assert_eq!(
            queue
                .pop()
                .await
                .unwrap()
                .payload()
                .default_value()
                .unwrap()
                .as_int(),
            Some(0)
        );
    }
}
