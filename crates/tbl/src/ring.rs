//! Fixed-capacity ring buffers.
//!
//! Both buffers keep one slot free to tell "full" from "empty": a buffer
//! created with capacity `C` is full once `(head - tail) mod C == 1`, so it
//! holds at most `C - 1` items. Enqueueing into a full buffer is rejected with
//! [`Full`], handing the item back; the buffers never grow.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::sync::Mutex;

/// Default capacity of every request queue and execution stack.
pub const QUEUE_CAPACITY: usize = 1024;

/// Returned when an item is offered to a full buffer.
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Recovers the rejected item.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ring buffer is full")
    }
}

impl<T> std::error::Error for Full<T> {}

#[inline]
fn forward(index: usize, capacity: usize) -> usize {
    (index + 1) % capacity
}

#[inline]
fn backward(index: usize, capacity: usize) -> usize {
    (index + capacity - 1) % capacity
}

#[inline]
fn occupancy(head: usize, tail: usize, capacity: usize) -> usize {
    (tail + capacity - head) % capacity
}

#[inline]
fn full_at(head: usize, tail: usize, capacity: usize) -> bool {
    (head + capacity - tail) % capacity == 1
}

fn check_capacity(capacity: usize) {
    assert!(
        capacity >= 2,
        "ring buffer capacity must be at least 2, got {capacity}"
    );
}

/// Circular buffer with single-threaded semantics.
///
/// Besides FIFO `enqueue`/`dequeue` it supports [`push_front`](Self::push_front),
/// which lets the execution stack reuse the buffer as a LIFO.
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
}

impl<T> RingBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    /// Creates a buffer with `capacity` slots (`capacity - 1` usable).
    ///
    /// # Panics
    ///
    /// Panics when `capacity < 2`.
    pub fn with_capacity(capacity: usize) -> Self {
        check_capacity(capacity);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        occupancy(self.head, self.tail, self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        full_at(self.head, self.tail, self.capacity())
    }

    /// Appends at the tail.
    pub fn enqueue(&mut self, item: T) -> Result<(), Full<T>> {
        if self.is_full() {
            return Err(Full(item));
        }
        self.slots[self.tail] = Some(item);
        self.tail = forward(self.tail, self.capacity());
        Ok(())
    }

    /// Removes the item at the head.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = forward(self.head, self.capacity());
        item
    }

    /// Inserts at the head, ahead of everything already buffered.
    pub fn push_front(&mut self, item: T) -> Result<(), Full<T>> {
        if self.is_full() {
            return Err(Full(item));
        }
        self.head = backward(self.head, self.capacity());
        self.slots[self.head] = Some(item);
        Ok(())
    }

    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            self.slots[self.head].as_ref()
        }
    }

    pub fn clear(&mut self) {
        while self.dequeue().is_some() {}
    }

    /// Iterates from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.len()).filter_map(move |offset| self.slots[(self.head + offset) % capacity].as_ref())
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Thread-safe ring buffer with independent head and tail locks.
///
/// `enqueue` takes only the tail lock and `dequeue`/`peek` only the head lock,
/// so one producer and one consumer never contend. The indices are published
/// through atomics: each side reads the opposite index with `Acquire`, which
/// at worst sees the buffer fuller (producer) or emptier (consumer) than it
/// is. Operations that need a consistent view of both ends (`is_full`,
/// `is_empty`, `len`, `push_front`) take both locks, always head then tail.
pub struct ConcurrentRingBuffer<T> {
    slots: Box<[Mutex<Option<T>>]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    head_lock: Mutex<()>,
    tail_lock: Mutex<()>,
}

impl<T> ConcurrentRingBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics when `capacity < 2`.
    pub fn with_capacity(capacity: usize) -> Self {
        check_capacity(capacity);
        Self {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            head_lock: Mutex::new(()),
            tail_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        let _head = self.head_lock.lock();
        let _tail = self.tail_lock.lock();
        full_at(
            self.head.load(Ordering::Relaxed),
            self.tail.load(Ordering::Relaxed),
            self.capacity(),
        )
    }

    pub fn is_empty(&self) -> bool {
        let _head = self.head_lock.lock();
        let _tail = self.tail_lock.lock();
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        let _head = self.head_lock.lock();
        let _tail = self.tail_lock.lock();
        occupancy(
            self.head.load(Ordering::Relaxed),
            self.tail.load(Ordering::Relaxed),
            self.capacity(),
        )
    }

    /// Appends at the tail (tail lock only).
    pub fn enqueue(&self, item: T) -> Result<(), Full<T>> {
        let _tail = self.tail_lock.lock();
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if full_at(head, tail, self.capacity()) {
            return Err(Full(item));
        }
        *self.slots[tail].lock() = Some(item);
        self.tail
            .store(forward(tail, self.capacity()), Ordering::Release);
        Ok(())
    }

    /// Removes the item at the head (head lock only).
    pub fn dequeue(&self) -> Option<T> {
        let _head = self.head_lock.lock();
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let item = self.slots[head].lock().take();
        self.head
            .store(forward(head, self.capacity()), Ordering::Release);
        item
    }

    /// Inserts at the head.
    ///
    /// Holds both locks so the slot written here can never be the one a
    /// concurrent `enqueue` is filling.
    pub fn push_front(&self, item: T) -> Result<(), Full<T>> {
        let _head = self.head_lock.lock();
        let _tail = self.tail_lock.lock();
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        if full_at(head, tail, self.capacity()) {
            return Err(Full(item));
        }
        let head = backward(head, self.capacity());
        *self.slots[head].lock() = Some(item);
        self.head.store(head, Ordering::Release);
        Ok(())
    }

    /// Returns a copy of the head item without removing it.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_with(T::clone)
    }

    /// Applies `f` to the head item without removing it.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let _head = self.head_lock.lock();
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let slot = self.slots[head].lock();
        slot.as_ref().map(f)
    }

    /// Returns `true` if any buffered item satisfies `predicate`.
    pub fn any(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        let _head = self.head_lock.lock();
        let _tail = self.tail_lock.lock();
        let capacity = self.capacity();
        let head = self.head.load(Ordering::Relaxed);
        let len = occupancy(head, self.tail.load(Ordering::Relaxed), capacity);
        (0..len).any(|offset| {
            self.slots[(head + offset) % capacity]
                .lock()
                .as_ref()
                .map_or(false, &mut predicate)
        })
    }
}

impl<T> Default for ConcurrentRingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ConcurrentRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentRingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
