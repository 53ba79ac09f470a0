//! Bounded Queue
//!
//! A fixed-capacity FIFO used between the transport reader task and whoever
//! consumes its frames (the correlation client), and again between the client
//! and the dispatcher.
//!
//! # Semantics
//!
//! - `enqueue` suspends while the queue is full and fails once the enqueue
//!   side has been closed.
//! - `dequeue` suspends while the queue is empty.
//! - `close` pushes a terminal marker behind any items already queued. The
//!   consumer drains those items first, then the `dequeue` that reaches the
//!   marker fails with [`QueueClosed`], and so does every later `dequeue`.
//! - `close` waits for room like `enqueue`; `close_now` appends the marker
//!   immediately and is what shutdown paths use.
//!
//! Wake-ups always re-check the shared state, so more than one producer or
//! consumer may wait on the same side without losing items.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default capacity used by the transport and client queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Error returned once either side of a [`BoundedQueue`] has been closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue closed")]
pub struct QueueClosed;

/// A queued slot: either a value or the close marker
enum Slot<T> {
    Item(T),
    Closed,
}

struct QueueState<T> {
    slots: VecDeque<Slot<T>>,
    enqueue_closed: bool,
    dequeue_closed: bool,
}

/// Fixed-capacity async FIFO with a one-shot close protocol
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    items_available: Notify,
    room_available: Notify,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` slots
    ///
    /// A capacity of zero is raised to one, since the close marker needs a
    /// slot of its own.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                slots: VecDeque::with_capacity(capacity),
                enqueue_closed: false,
                dequeue_closed: false,
            }),
            items_available: Notify::new(),
            room_available: Notify::new(),
            capacity,
        }
    }

    /// Maximum number of slots
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items waiting to be dequeued (the close marker is not counted)
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Item(_)))
            .count()
    }

    /// Whether no items are waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `close` has completed
    #[must_use]
    pub fn is_enqueue_closed(&self) -> bool {
        self.state.lock().enqueue_closed
    }

    /// Whether a consumer has reached the close marker
    #[must_use]
    pub fn is_dequeue_closed(&self) -> bool {
        self.state.lock().dequeue_closed
    }

    /// Append an item, waiting for room if the queue is full
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the enqueue side is closed, including when
    /// it closes while this call is waiting for room.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueClosed> {
        self.push(Slot::Item(item)).await
    }

    /// Close the queue
    ///
    /// Waits for room like `enqueue` does, then appends the close marker and
    /// closes the enqueue side in the same step.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue was already closed. Callers that
    /// may race to close should treat that as success.
    pub async fn close(&self) -> Result<(), QueueClosed> {
        self.push(Slot::Closed).await
    }

    /// Close the queue without waiting for room
    ///
    /// The close marker goes behind any queued items even when the queue is
    /// full, so it may briefly hold one slot more than `capacity`. Producers
    /// waiting for room fail with [`QueueClosed`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue was already closed.
    pub fn close_now(&self) -> Result<(), QueueClosed> {
        {
            let mut state = self.state.lock();
            if state.enqueue_closed {
                return Err(QueueClosed);
            }
            state.enqueue_closed = true;
            state.slots.push_back(Slot::Closed);
        }
        self.items_available.notify_one();
        self.room_available.notify_waiters();
        Ok(())
    }

    async fn push(&self, slot: Slot<T>) -> Result<(), QueueClosed> {
        let mut slot = Some(slot);
        loop {
            let notified = self.room_available.notified();
            {
                let mut state = self.state.lock();
                if state.enqueue_closed {
                    return Err(QueueClosed);
                }
                if state.slots.len() < self.capacity {
                    if let Some(slot) = slot.take() {
                        if matches!(slot, Slot::Closed) {
                            state.enqueue_closed = true;
                        }
                        state.slots.push_back(slot);
                    }
                    drop(state);
                    self.items_available.notify_one();
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Remove the oldest item, waiting while the queue is empty
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] when this call consumes the close marker and on
    /// every call after that.
    pub async fn dequeue(&self) -> Result<T, QueueClosed> {
        loop {
            let notified = self.items_available.notified();
            {
                let mut state = self.state.lock();
                if state.dequeue_closed {
                    return Err(QueueClosed);
                }
                match state.slots.pop_front() {
                    Some(Slot::Item(item)) => {
                        drop(state);
                        self.room_available.notify_one();
                        return Ok(item);
                    }
                    Some(Slot::Closed) => {
                        state.dequeue_closed = true;
                        drop(state);
                        // Other consumers must observe the close too
                        self.items_available.notify_waiters();
                        self.room_available.notify_waiters();
                        return Err(QueueClosed);
                    }
                    None => {}
                }
            }
            notified.await;
        }
    }

    /// Adapt a shared queue into a stream that ends at the close marker
    pub fn into_stream(self: Arc<Self>) -> impl Stream<Item = T>
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |queue| async move {
            match queue.dequeue().await {
                Ok(item) => Some((item, queue)),
                Err(QueueClosed) => None,
            }
        })
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.slots.len())
            .field("enqueue_closed", &state.enqueue_closed)
            .field("dequeue_closed", &state.dequeue_closed)
            .finish()
    }
}
