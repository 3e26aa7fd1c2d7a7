//! # Submission Queue
//!
//! Deduplicating priority queue of pending submissions. Higher priority
//! dequeues first; within a priority, earlier `enqueued_at` first, then
//! insertion order.
//!
//! The queue also owns the in-flight marker set: a dequeued key stays marked
//! until the worker calls [`SubmissionQueue::complete`] or hands the item back
//! through [`SubmissionQueue::requeue`], so no key is ever dispatched twice at
//! the same time. Ordering map, key index and marker set share one mutex.
//!
//! Whether a key was already delivered is the status tracker's call; the
//! queue only knows about work that is waiting or running.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{QueuedSubmission, SubmissionKey};

type OrderKey = (Reverse<i32>, DateTime<Utc>, u64);

/// Why an enqueue was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueRejection {
    #[error("an item with the same key is already queued")]
    AlreadyQueued,
    #[error("an attempt for the same key is in flight")]
    InFlight,
}

#[derive(Debug, Default)]
struct QueueState {
    ordered: BTreeMap<OrderKey, QueuedSubmission>,
    index: HashMap<SubmissionKey, OrderKey>,
    in_flight: HashSet<SubmissionKey>,
    next_seq: u64,
}

impl QueueState {
    fn insert(&mut self, item: QueuedSubmission) {
        let order = (Reverse(item.priority), item.enqueued_at, self.next_seq);
        self.next_seq += 1;
        self.index.insert(item.key.clone(), order);
        self.ordered.insert(order, item);
    }
}

#[derive(Debug, Default)]
pub struct SubmissionQueue {
    state: Mutex<QueueState>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item unless its key is queued or in flight
    pub fn try_enqueue(&self, item: QueuedSubmission) -> Result<(), EnqueueRejection> {
        let mut state = self.state.lock();
        if state.in_flight.contains(&item.key) {
            return Err(EnqueueRejection::InFlight);
        }
        if state.index.contains_key(&item.key) {
            return Err(EnqueueRejection::AlreadyQueued);
        }
        state.insert(item);
        Ok(())
    }

    pub fn enqueue(&self, item: QueuedSubmission) -> bool {
        self.try_enqueue(item).is_ok()
    }

    /// Pop the highest-priority item and mark its key in flight
    pub fn dequeue(&self) -> Option<QueuedSubmission> {
        let mut state = self.state.lock();
        let order = state
            .ordered
            .iter()
            .find(|(_, item)| !state.in_flight.contains(&item.key))
            .map(|(order, _)| *order)?;
        let item = state.ordered.remove(&order)?;
        state.index.remove(&item.key);
        state.in_flight.insert(item.key.clone());
        Some(item)
    }

    /// Release the in-flight marker for a finished attempt
    pub fn complete(&self, key: &SubmissionKey) {
        self.state.lock().in_flight.remove(key);
    }

    /// Move an in-flight item back into the queue in one step. The item gets a
    /// fresh `enqueued_at`.
    pub fn requeue(&self, mut item: QueuedSubmission) -> Result<(), EnqueueRejection> {
        let mut state = self.state.lock();
        state.in_flight.remove(&item.key);
        if state.index.contains_key(&item.key) {
            return Err(EnqueueRejection::AlreadyQueued);
        }
        item.enqueued_at = Utc::now();
        state.insert(item);
        Ok(())
    }

    /// Queued or in flight
    pub fn contains(&self, key: &SubmissionKey) -> bool {
        let state = self.state.lock();
        state.index.contains_key(key) || state.in_flight.contains(key)
    }

    /// Remove a queued (not in-flight) item
    pub fn remove(&self, key: &SubmissionKey) -> Option<QueuedSubmission> {
        let mut state = self.state.lock();
        let order = state.index.remove(key)?;
        state.ordered.remove(&order)
    }

    pub fn len(&self) -> usize {
        self.state.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().ordered.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// First `limit` items in dequeue order
    pub fn snapshot(&self, limit: usize) -> Vec<QueuedSubmission> {
        self.state
            .lock()
            .ordered
            .values()
            .take(limit)
            .cloned()
            .collect()
    }
}
