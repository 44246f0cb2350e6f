// Local Bucket Executor.
//
// Fans an operation across this node's local drives and enforces
// drive-level quorum. Every function here takes the drive snapshot as
// a parameter rather than reaching into global state: the mutable
// state is threaded through instead of hidden behind a global lock.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::config::ClusterConfig;
use crate::drive::{Drive, DriveState, VolInfo};
use crate::error::{PeerError, Result};
use crate::node::{deleted_bucket_path, is_meta_bucket, DELETED_BUCKETS_PREFIX};
use crate::quorum::{heal_quorum, reduce_quorum_errs, write_quorum};
use crate::types::{BucketInfo, BucketOptions, DeleteBucketOptions, HealOptions, HealResult, MakeBucketOptions};

/// Default concurrency cap for drive fan-out, used when a
/// `LocalDrives` is constructed with `new` rather than
/// `with_concurrency`/`from_config`.
pub const LOCAL_DRIVE_CONCURRENCY: usize = 32;

/// When a heal-triggered delete meets a drive that still holds
/// objects, treat the refusal as non-fatal and leave that drive's
/// reported state as `Ok` rather than failing the whole heal. A future
/// caller wanting strict heal semantics flips this without touching
/// the heal loop itself.
pub const HEAL_DELETE_BEST_EFFORT: bool = true;

/// Process-wide registry of local drive handles, guarded by a
/// reader-writer lock with the snapshot-then-release discipline:
/// `Arc<Vec<_>>` makes the snapshot a cheap pointer clone; replacing
/// the set via `set_drives` is copy-on-write. Carries the concurrency
/// cap every executor function below fans out with, so the cap
/// travels with the drive set it bounds rather than living as a
/// hardcoded constant at each call site.
pub struct LocalDrives {
    inner: parking_lot::RwLock<Arc<Vec<Arc<dyn Drive>>>>,
    concurrency: usize,
}

impl LocalDrives {
    pub fn new(drives: Vec<Arc<dyn Drive>>) -> Self {
        Self::with_concurrency(drives, LOCAL_DRIVE_CONCURRENCY)
    }

    pub fn with_concurrency(drives: Vec<Arc<dyn Drive>>, concurrency: usize) -> Self {
        Self { inner: parking_lot::RwLock::new(Arc::new(drives)), concurrency }
    }

    /// Construct a registry honoring `config.local_drive_concurrency`.
    pub fn from_config(drives: Vec<Arc<dyn Drive>>, config: &ClusterConfig) -> Self {
        Self::with_concurrency(drives, config.local_drive_concurrency)
    }

    /// Snapshot the current drive list. The read lock is held only
    /// long enough to clone the `Arc` pointer, never across I/O.
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn Drive>>> {
        self.inner.read().clone()
    }

    pub fn set_drives(&self, drives: Vec<Arc<dyn Drive>>) {
        *self.inner.write() = Arc::new(drives);
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

impl Default for LocalDrives {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

async fn fan_out<T, F, Fut>(drives: &[Arc<dyn Drive>], concurrency: usize, op: F) -> Vec<Result<T>>
where
    F: Fn(Arc<dyn Drive>) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    stream::iter(drives.iter().cloned())
        .map(|drive| op(drive))
        .buffered(concurrency)
        .collect()
        .await
}

fn err_of<T>(r: &Result<T>) -> Option<PeerError> {
    r.as_ref().err().cloned()
}

pub async fn list_buckets_local(
    drives: &[Arc<dyn Drive>],
    concurrency: usize,
    opts: BucketOptions,
) -> Result<Vec<BucketInfo>> {
    let quorum = heal_quorum(drives.len());

    let listings = fan_out(drives, concurrency, |drive| async move {
        if drive.offline() {
            return Err(PeerError::DiskNotFound);
        }
        drive.list_vols().await
    })
    .await;

    let mut votes: std::collections::HashMap<String, (VolInfo, usize)> = std::collections::HashMap::new();
    let mut tombstones: std::collections::HashMap<String, VolInfo> = std::collections::HashMap::new();

    for listing in listings.into_iter().flatten() {
        for vol in listing {
            if let Some(name) = vol.name.strip_prefix(DELETED_BUCKETS_PREFIX) {
                if opts.deleted {
                    tombstones.entry(name.to_string()).or_insert_with(|| VolInfo {
                        name: name.to_string(),
                        created: vol.created,
                    });
                }
                continue;
            }
            let entry = votes.entry(vol.name.clone()).or_insert_with(|| (vol.clone(), 0));
            entry.1 += 1;
        }
    }

    let mut buckets: Vec<BucketInfo> = votes
        .into_iter()
        .filter(|(_, (_, count))| *count >= quorum)
        .map(|(name, (vol, _))| BucketInfo {
            name: name.clone(),
            created: Some(vol.created),
            deleted: tombstones.get(&name).map(|t| t.created),
        })
        .collect();

    let listed: std::collections::HashSet<String> = buckets.iter().map(|b| b.name.clone()).collect();
    for (name, vol) in tombstones {
        if !listed.contains(&name) {
            buckets.push(BucketInfo { name, created: None, deleted: Some(vol.created) });
        }
    }

    Ok(buckets)
}

pub async fn get_bucket_info_local(
    drives: &[Arc<dyn Drive>],
    concurrency: usize,
    bucket: &str,
    opts: BucketOptions,
) -> Result<BucketInfo> {
    let results = fan_out(drives, concurrency, |drive| {
        let bucket = bucket.to_string();
        async move {
            if drive.offline() {
                return Err(PeerError::DiskNotFound);
            }
            match drive.stat_vol(&bucket).await {
                Ok(vi) => Ok(BucketInfo { name: bucket, created: Some(vi.created), deleted: None }),
                Err(PeerError::VolumeNotFound(_)) if opts.deleted => {
                    match drive.stat_vol(&deleted_bucket_path(&bucket)).await {
                        Ok(dvi) => Ok(BucketInfo { name: bucket, created: None, deleted: Some(dvi.created) }),
                        Err(_) => Err(PeerError::VolumeNotFound(bucket)),
                    }
                }
                Err(e) => Err(e),
            }
        }
    })
    .await;

    let outcomes: Vec<Option<PeerError>> = results.iter().map(err_of).collect();
    let quorum = write_quorum(drives.len());
    if let Some(err) = reduce_quorum_errs(&outcomes, quorum) {
        return Err(err);
    }

    results
        .into_iter()
        .find_map(std::result::Result::ok)
        .ok_or_else(|| PeerError::VolumeNotFound(bucket.to_string()))
}

pub async fn make_bucket_local(
    drives: &[Arc<dyn Drive>],
    concurrency: usize,
    bucket: &str,
    opts: MakeBucketOptions,
) -> Result<()> {
    let results = fan_out(drives, concurrency, |drive| {
        let bucket = bucket.to_string();
        async move {
            if drive.offline() {
                return Err(PeerError::DiskNotFound);
            }
            match drive.make_vol(&bucket).await {
                Err(PeerError::VolumeExists(_)) if opts.force_create => Ok(()),
                other => other,
            }
        }
    })
    .await;

    let outcomes: Vec<Option<PeerError>> = results.iter().map(err_of).collect();
    match reduce_quorum_errs(&outcomes, write_quorum(drives.len())) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

/// Rolls back any drive that already deleted its copy when another
/// drive refuses with `VolumeNotEmpty`, so the cluster never observes
/// a half-deleted non-empty bucket.
pub async fn delete_bucket_local(
    drives: &[Arc<dyn Drive>],
    concurrency: usize,
    bucket: &str,
    opts: DeleteBucketOptions,
) -> Result<()> {
    let results = fan_out(drives, concurrency, |drive| {
        let bucket = bucket.to_string();
        async move {
            if drive.offline() {
                return Err(PeerError::DiskNotFound);
            }
            drive.delete_vol(&bucket, opts.force).await
        }
    })
    .await;

    let any_not_empty = results.iter().any(|r| matches!(r, Err(PeerError::VolumeNotEmpty(_))));
    if any_not_empty {
        for (drive, result) in drives.iter().zip(results.iter()) {
            if result.is_ok() {
                let _ = drive.make_vol(bucket).await;
            }
        }
        return Err(PeerError::VolumeNotEmpty(bucket.to_string()));
    }

    let outcomes: Vec<Option<PeerError>> = results.iter().map(err_of).collect();
    match reduce_quorum_errs(&outcomes, write_quorum(drives.len())) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

/// Classifies every drive's current state, then either removes a
/// dangling bucket or recreates a missing one depending on `opts.remove`.
pub async fn heal_bucket_local(
    drives: &[Arc<dyn Drive>],
    concurrency: usize,
    bucket: &str,
    opts: HealOptions,
) -> Result<HealResult> {
    let n = drives.len();
    let meta = is_meta_bucket(bucket);

    let before: Vec<DriveState> = fan_out(drives, concurrency, |drive| {
        let bucket = bucket.to_string();
        async move {
            if meta {
                return Ok(DriveState::Ok);
            }
            let state = match drive.stat_vol(&bucket).await {
                Ok(_) => DriveState::Ok,
                Err(PeerError::DiskNotFound) => DriveState::Offline,
                Err(PeerError::VolumeNotFound(_)) => DriveState::Missing,
                Err(_) => DriveState::Corrupt,
            };
            Ok::<DriveState, PeerError>(state)
        }
    })
    .await
    .into_iter()
    .map(|r| r.unwrap_or(DriveState::Offline))
    .collect();

    if opts.dry_run {
        return Ok(HealResult {
            bucket: bucket.to_string(),
            before: before.clone(),
            after: before,
            drive_count: n,
        });
    }

    let any_present = before.iter().any(|s| *s == DriveState::Ok);

    let after: Vec<DriveState> = if opts.remove && !meta && any_present {
        let states = fan_out(drives, concurrency, |drive| {
            let bucket = bucket.to_string();
            async move {
                if drive.offline() {
                    return Ok::<DriveState, PeerError>(DriveState::Offline);
                }
                match drive.delete_vol(&bucket, false).await {
                    Ok(()) => Ok(DriveState::Missing),
                    Err(PeerError::VolumeNotEmpty(_)) if HEAL_DELETE_BEST_EFFORT => {
                        warn!(bucket, "dangling bucket delete refused: volume not empty");
                        Ok(DriveState::Ok)
                    }
                    Err(PeerError::VolumeNotEmpty(_)) => Ok(DriveState::Corrupt),
                    Err(PeerError::VolumeNotFound(_)) => Ok(DriveState::Missing),
                    Err(_) => Ok(DriveState::Corrupt),
                }
            }
        })
        .await;

        before
            .iter()
            .zip(states)
            .map(|(pre, attempted)| if *pre == DriveState::Ok { attempted.unwrap_or(*pre) } else { *pre })
            .collect()
    } else if !opts.remove {
        let mut after = before.clone();
        for (drive, state) in drives.iter().zip(after.iter_mut()) {
            if *state == DriveState::Missing {
                debug!(bucket, drive = drive.id(), "heal recreating missing volume");
                if drive.make_vol(bucket).await.is_ok() {
                    *state = DriveState::Ok;
                }
            }
        }
        after
    } else {
        before.clone()
    };

    Ok(HealResult { bucket: bucket.to_string(), before, after, drive_count: n })
}
