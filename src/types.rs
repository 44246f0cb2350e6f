// Cluster-observable record types and per-call option structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drive::DriveState;

/// Cluster-observable record for a bucket. `created` is absent if
/// only a deletion-marker exists; `deleted` is present for tombstoned
/// buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub deleted: Option<DateTime<Utc>>,
}

impl BucketInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), created: None, deleted: None }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketOptions {
    /// Include tombstoned buckets in the result.
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeBucketOptions {
    /// Treat `VolumeExists` as success.
    pub force_create: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBucketOptions {
    /// Permit deletion of a non-empty volume.
    pub force: bool,
}

/// Heal flags. Only `remove` is stored; `recreate()` is
/// derived since the two were redundant in the source protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealOptions {
    pub dry_run: bool,
    pub remove: bool,
}

impl HealOptions {
    pub fn recreate(&self) -> bool {
        !self.remove
    }
}

/// Per-operation heal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealResult {
    pub bucket: String,
    pub before: Vec<DriveState>,
    pub after: Vec<DriveState>,
    pub drive_count: usize,
}

impl HealResult {
    pub fn new(bucket: impl Into<String>, drive_count: usize) -> Self {
        Self { bucket: bucket.into(), before: Vec::new(), after: Vec::new(), drive_count }
    }
}

/// Repair hint enqueued into the external MRF queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialOp {
    pub bucket: String,
    pub queued: DateTime<Utc>,
}
