// Partial-Op Queue Hook.
//
// The repair queue itself (the MRF queue) lives outside this core;
// this module is only the non-blocking enqueue seam the coordinator
// calls when listing loses quorum for a bucket name.

use chrono::Utc;
use parking_lot::Mutex;

use crate::types::PartialOp;

pub trait PartialOpQueue: Send + Sync {
    /// Enqueue a repair hint. Must never block the caller; losing the
    /// enqueue is acceptable since the next list will re-detect the
    /// dangling bucket.
    fn add_partial_op(&self, bucket: &str);
}

/// A queue that drops every enqueue. Used where the coordinator is
/// constructed without a real MRF queue wired in.
#[derive(Default)]
pub struct NullPartialOpQueue;

impl PartialOpQueue for NullPartialOpQueue {
    fn add_partial_op(&self, _bucket: &str) {}
}

/// Simple in-memory queue for tests and single-process deployments.
/// Deduplication is explicitly the queue's own responsibility
/// — this one does not dedupe, it just records.
#[derive(Default)]
pub struct InMemoryPartialOpQueue {
    ops: Mutex<Vec<PartialOp>>,
}

impl InMemoryPartialOpQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<PartialOp> {
        std::mem::take(&mut self.ops.lock())
    }

    pub fn len(&self) -> usize {
        self.ops.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialOpQueue for InMemoryPartialOpQueue {
    fn add_partial_op(&self, bucket: &str) {
        self.ops.lock().push(PartialOp { bucket: bucket.to_string(), queued: Utc::now() });
    }
}
