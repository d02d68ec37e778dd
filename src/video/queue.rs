//! Bounded circular queue of decoded video frames.
//!
//! Video arrives in bursts under network jitter.  [`FrameQueue`] absorbs the
//! bursts in a fixed number of slots; when full, the **oldest** frame is
//! evicted so the newest is always kept.  Each eviction increments a
//! backpressure counter that lives for the whole session (it survives
//! [`clear`](FrameQueue::clear)).
//!
//! The queue does no locking.  Share it between threads only behind an
//! explicit `Mutex` or channel boundary.
//!
//! # Example
//!
//! ```rust
//! use bytes::Bytes;
//! use media_pipeline::codec::FrameHeader;
//! use media_pipeline::video::FrameQueue;
//!
//! let header = |seq: u32| FrameHeader { timestamp: seq as f64 * 0.5, seq, width: 640, height: 480 };
//!
//! let mut queue = FrameQueue::new(2);
//! queue.enqueue(header(0), Bytes::from_static(b"a"));
//! queue.enqueue(header(1), Bytes::from_static(b"b"));
//! queue.enqueue(header(2), Bytes::from_static(b"c")); // evicts seq 0
//!
//! assert_eq!(queue.frames_dropped_by_backpressure(), 1);
//! assert_eq!(queue.dequeue().unwrap().header().seq, 1);
//! ```

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::codec::{FrameHeader, VideoFrame};
use crate::config::QueueConfig;

/// Default number of slots.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

// ---------------------------------------------------------------------------
// QueuedFrame
// ---------------------------------------------------------------------------

/// A frame held by the queue, stamped with its arrival time.
#[derive(Debug, Clone)]
pub struct QueuedFrame {
    pub frame: VideoFrame,
    pub enqueued_at: Instant,
}

impl QueuedFrame {
    pub fn header(&self) -> &FrameHeader {
        &self.frame.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.frame.payload
    }

    /// Time spent waiting since enqueue.
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub fn into_frame(self) -> VideoFrame {
        self.frame
    }
}

// ---------------------------------------------------------------------------
// FrameQueue
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO with drop-oldest overflow.
///
/// Slots are `Option`s that are emptied with `take()` on dequeue and
/// eviction, so the queue never keeps a payload it no longer owns.
pub struct FrameQueue {
    slots: Vec<Option<QueuedFrame>>,
    /// Index of the oldest frame.
    head: usize,
    /// Index of the next write.
    tail: usize,
    len: usize,
    dropped: u64,
}

impl FrameQueue {
    /// Create a queue with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameQueue capacity must be > 0");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            len: 0,
            dropped: 0,
        }
    }

    /// Capacity from config; a configured `0` falls back to the default.
    pub fn from_config(config: &QueueConfig) -> Self {
        if config.capacity == 0 {
            log::warn!(
                "queue: capacity 0 is invalid, using {}",
                DEFAULT_QUEUE_CAPACITY
            );
            return Self::new(DEFAULT_QUEUE_CAPACITY);
        }
        Self::new(config.capacity)
    }

    /// Insert a frame at the tail.
    ///
    /// Returns `true` when the queue was full and the oldest frame was
    /// evicted to make room.
    pub fn enqueue(&mut self, header: FrameHeader, payload: Bytes) -> bool {
        self.push(VideoFrame { header, payload })
    }

    /// [`enqueue`](Self::enqueue) for an already-assembled frame.
    pub fn push(&mut self, frame: VideoFrame) -> bool {
        let evicted = self.len == self.capacity();
        if evicted {
            if let Some(old) = self.slots[self.head].take() {
                log::debug!(
                    "queue: full, dropping frame seq={} (waited {:?})",
                    old.frame.header.seq,
                    old.age()
                );
            }
            self.head = (self.head + 1) % self.capacity();
            self.len -= 1;
            self.dropped += 1;
        }

        self.slots[self.tail] = Some(QueuedFrame {
            frame,
            enqueued_at: Instant::now(),
        });
        self.tail = (self.tail + 1) % self.capacity();
        self.len += 1;
        evicted
    }

    /// Remove and return the oldest frame, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<QueuedFrame> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        item
    }

    /// Release every held frame and reset to empty.
    ///
    /// The backpressure counter is **not** reset.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Frames currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Number of slots, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Frames evicted by drop-oldest over the queue's lifetime.
    pub fn frames_dropped_by_backpressure(&self) -> u64 {
        self.dropped
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
