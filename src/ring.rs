//! Single-producer, single-consumer frame queue
//!
//! A fixed number of slots is allocated up front and recycled: the producer
//! fills a free slot in place and the consumer drains it in place, so frames
//! are never allocated while streaming.
//!
//! The queue is split into a [`Producer`] and a [`Consumer`] handle. Neither
//! handle can be cloned, which is what makes the two free-running cursors
//! sufficient for synchronization. The write cursor is only advanced by the
//! producer and the read cursor only by the consumer; `write - read` is the
//! fill level and never leaves `0..=capacity`.

use std::{
    cell::UnsafeCell,
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

struct Shared<T> {
    slots: Box<[UnsafeCell<T>]>,
    read: AtomicUsize,
    write: AtomicUsize,
}

// The slot at a given position is only ever touched by the handle that owns
// it at that moment, as decided by the cursors.
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn fill(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);

        write.wrapping_sub(read)
    }
}

/// Creates a queue whose slots are built by `init`
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn with_capacity<T, F>(capacity: usize, init: F) -> (Producer<T>, Consumer<T>)
where
    F: FnMut() -> T,
{
    assert!(capacity > 0, "ring capacity must not be zero");

    let slots = core::iter::repeat_with(init)
        .take(capacity)
        .map(UnsafeCell::new)
        .collect();
    let shared = Arc::new(Shared {
        slots,
        read: AtomicUsize::new(0),
        write: AtomicUsize::new(0),
    });

    (
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    )
}

/// The writing end of the queue
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Producer<T> {
    /// Fills the next free slot with `f`
    ///
    /// Returns `false` without calling `f` if the queue is full. The slot
    /// still holds whatever frame was popped from it last, `f` is expected to
    /// overwrite it.
    pub fn try_push<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= shared.capacity() {
            return false;
        }

        let slot = &shared.slots[write % shared.capacity()];
        // SAFETY: the slot is free, the consumer won't touch it until the
        // write cursor is advanced below.
        f(unsafe { &mut *slot.get() });
        shared.write.store(write.wrapping_add(1), Ordering::Release);

        true
    }

    /// Number of slots currently holding a frame
    pub fn fill(&self) -> usize {
        self.shared.fill()
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// The reading end of the queue
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Consumer<T> {
    /// Drains the oldest occupied slot with `f`
    ///
    /// Returns `false` without calling `f` if the queue is empty. `f` may
    /// swap the content out, the slot is handed back to the producer as is.
    pub fn try_pop<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);

        if write == read {
            return false;
        }

        let slot = &shared.slots[read % shared.capacity()];
        // SAFETY: the slot is occupied, the producer won't touch it until the
        // read cursor is advanced below.
        f(unsafe { &mut *slot.get() });
        shared.read.store(read.wrapping_add(1), Ordering::Release);

        true
    }

    /// Polls until at least `n` slots are occupied
    ///
    /// Sleeps `interval` between checks. Blocks forever if the producer stops
    /// pushing, see [`wait_fill_or`](Self::wait_fill_or).
    pub fn wait_fill(&self, n: usize, interval: Duration) {
        self.wait_fill_or(n, interval, || false);
    }

    /// Polls until at least `n` slots are occupied or `abort` returns `true`
    ///
    /// Returns whether the fill level was reached.
    pub fn wait_fill_or<F>(&self, n: usize, interval: Duration, mut abort: F) -> bool
    where
        F: FnMut() -> bool,
    {
        loop {
            if self.shared.fill() >= n {
                return true;
            }
            if abort() {
                // Frames pushed right before the abort still count
                return self.shared.fill() >= n;
            }
            thread::sleep(interval);
        }
    }

    /// Number of slots currently holding a frame
    pub fn fill(&self) -> usize {
        self.shared.fill()
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Producer {{ fill: {}, capacity: {} }}", self.fill(), self.capacity())
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Consumer {{ fill: {}, capacity: {} }}", self.fill(), self.capacity())
    }
}
