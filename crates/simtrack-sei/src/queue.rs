//! # Tracking Record Queue
//!
//! Bounded hand-off between the inference callback (producer) and the
//! encoder-output callback (consumer). The two run on different threads at
//! different rates, so both sides must be non-blocking:
//!
//! - `push` never waits: when full, the oldest record is evicted first.
//! - `try_pop` never waits: an empty queue is the normal case for the
//!   many access units that are not keyframes.
//!
//! A single mutex guards both operations so eviction and insertion are one
//! atomic step.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::record::TrackingRecord;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 10;

/// Anything the injector can pull a pending record from.
pub trait RecordSource {
    /// Take the next pending record without blocking.
    fn try_pop(&self) -> Option<TrackingRecord>;
}

/// Lock a mutex, recovering from poison (prior panic in another thread).
fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drop-oldest bounded FIFO of [`TrackingRecord`]s.
#[derive(Debug)]
pub struct RecordQueue {
    records: Mutex<VecDeque<TrackingRecord>>,
    capacity: usize,
}

impl RecordQueue {
    /// Create a queue holding [`DEFAULT_CAPACITY`] records.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a queue holding at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        RecordQueue {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueue `record`, evicting and returning the oldest one if full.
    pub fn push(&self, record: TrackingRecord) -> Option<TrackingRecord> {
        let mut records = lock_or_recover(&self.records);
        let evicted = if records.len() >= self.capacity {
            records.pop_front()
        } else {
            None
        };
        records.push_back(record);
        evicted
    }

    /// Dequeue the oldest record, if any.
    pub fn try_pop(&self) -> Option<TrackingRecord> {
        lock_or_recover(&self.records).pop_front()
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_or_recover(&self.records).is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecordQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSource for RecordQueue {
    fn try_pop(&self) -> Option<TrackingRecord> {
        RecordQueue::try_pop(self)
    }
}

impl<T: RecordSource + ?Sized> RecordSource for std::sync::Arc<T> {
    fn try_pop(&self) -> Option<TrackingRecord> {
        (**self).try_pop()
    }
}
