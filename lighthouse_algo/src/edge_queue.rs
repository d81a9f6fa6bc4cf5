// Lock-free single-producer / single-consumer queue of capture timestamps.
// The producer half lives in the capture interrupt, the consumer half in the decode loop.

// Key Features:
// - Fixed capacity, statically allocated, usable from a `static` or an RTIC local resource.
// - Push never blocks; a full queue drops the newest edge and counts it.
// - Cursor stores use release ordering so the consumer never sees a slot before its data.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Returned by [`EdgeProducer::push`] when the consumer has fallen behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueFull;

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "edge queue full, newest edge dropped")
    }
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicU32 = AtomicU32::new(0);

/// Ring buffer backing one sensor channel. Holds up to `N - 1` edges.
pub struct EdgeQueue<const N: usize> {
    slots: [AtomicU32; N],
    write: AtomicUsize,  // Next slot the producer fills, owned by the producer
    read: AtomicUsize,   // Next slot the consumer empties, owned by the consumer
    dropped: AtomicU32,  // Edges rejected because the queue was full
}

impl<const N: usize> EdgeQueue<N> {
    /// Usable capacity; one slot stays free to tell "full" from "empty".
    pub const CAPACITY: usize = {
        assert!(N >= 2, "edge queue needs at least two slots");
        N - 1
    };

    pub const fn new() -> Self {
        let _ = Self::CAPACITY;
        Self {
            slots: [EMPTY_SLOT; N],
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Splits the queue into its producer and consumer halves.
    ///
    /// The exclusive borrow guarantees there is exactly one of each.
    pub fn split(&mut self) -> (EdgeProducer<'_, N>, EdgeConsumer<'_, N>) {
        let queue: &Self = self;
        (EdgeProducer { queue }, EdgeConsumer { queue })
    }

    #[inline(always)]
    const fn next(idx: usize) -> usize {
        (idx + 1) % N
    }
}

impl<const N: usize> Default for EdgeQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half, owned by the capture interrupt.
pub struct EdgeProducer<'a, const N: usize> {
    queue: &'a EdgeQueue<N>,
}

impl<'a, const N: usize> EdgeProducer<'a, N> {
    /// Stores one captured timestamp. Never blocks.
    pub fn push(&mut self, tick: u32) -> Result<(), QueueFull> {
        let q = self.queue;
        let write = q.write.load(Ordering::Relaxed);
        let next = EdgeQueue::<N>::next(write);

        // Acquire pairs with the consumer's release, the slot is vacated once we see it
        if next == q.read.load(Ordering::Acquire) {
            // Only this context writes the counter, no read-modify-write needed
            let dropped = q.dropped.load(Ordering::Relaxed);
            q.dropped.store(dropped.wrapping_add(1), Ordering::Relaxed);
            return Err(QueueFull);
        }

        q.slots[write].store(tick, Ordering::Relaxed);
        // Publish the slot only after its data is written
        q.write.store(next, Ordering::Release);
        Ok(())
    }
}

/// Reading half, owned by the decode loop.
pub struct EdgeConsumer<'a, const N: usize> {
    queue: &'a EdgeQueue<N>,
}

impl<'a, const N: usize> EdgeConsumer<'a, N> {
    /// Takes the oldest unread timestamp, `None` when the queue is empty.
    pub fn pop(&mut self) -> Option<u32> {
        let q = self.queue;
        let read = q.read.load(Ordering::Relaxed);
        if read == q.write.load(Ordering::Acquire) {
            return None;
        }

        let tick = q.slots[read].load(Ordering::Relaxed);
        q.read.store(EdgeQueue::<N>::next(read), Ordering::Release);
        Some(tick)
    }

    /// Number of edges waiting to be read.
    pub fn len(&self) -> usize {
        let write = self.queue.write.load(Ordering::Acquire);
        let read = self.queue.read.load(Ordering::Relaxed);
        (write + N - read) % N
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of edges dropped by the producer since start-up (wrapping).
    pub fn dropped(&self) -> u32 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut queue: EdgeQueue<8> = EdgeQueue::new();
        let (mut tx, mut rx) = queue.split();

        assert_eq!(rx.pop(), None);
        for tick in [10, 20, 30] {
            tx.push(tick).unwrap();
        }
        assert_eq!(rx.len(), 3);
        assert_eq!(rx.pop(), Some(10));
        assert_eq!(rx.pop(), Some(20));
        assert_eq!(rx.pop(), Some(30));
        assert_eq!(rx.pop(), None);
        assert!(rx.is_empty());
    }

    #[test]
    fn overflow_drops_newest_and_keeps_unread() {
        let mut queue: EdgeQueue<4> = EdgeQueue::new();
        assert_eq!(EdgeQueue::<4>::CAPACITY, 3);
        let (mut tx, mut rx) = queue.split();

        tx.push(1).unwrap();
        tx.push(2).unwrap();
        tx.push(3).unwrap();
        assert_eq!(tx.push(4), Err(QueueFull));
        assert_eq!(tx.push(5), Err(QueueFull));
        assert_eq!(rx.dropped(), 2);

        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), Some(3));
        assert_eq!(rx.pop(), None);

        // Space is usable again once drained
        tx.push(6).unwrap();
        assert_eq!(rx.pop(), Some(6));
    }

    #[test]
    fn cursors_wrap_around_the_buffer() {
        let mut queue: EdgeQueue<5> = EdgeQueue::new();
        let (mut tx, mut rx) = queue.split();
        for round in 0..50u32 {
            tx.push(round * 2).unwrap();
            tx.push(round * 2 + 1).unwrap();
            assert_eq!(rx.pop(), Some(round * 2));
            assert_eq!(rx.pop(), Some(round * 2 + 1));
        }
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn concurrent_producer_and_consumer() {
        const EDGES: u32 = 100_000;
        let mut queue: EdgeQueue<16> = EdgeQueue::new();
        let (mut tx, mut rx) = queue.split();

        std::thread::scope(|s| {
            s.spawn(move || {
                let mut tick = 0;
                while tick < EDGES {
                    if tx.push(tick).is_ok() {
                        tick += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            });

            let mut expected = 0;
            while expected < EDGES {
                match rx.pop() {
                    Some(tick) => {
                        assert_eq!(tick, expected);
                        expected += 1;
                    }
                    None => std::thread::yield_now(),
                }
            }
        });
    }
}
