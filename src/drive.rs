// Drive-level storage capability.
//
// The real drive driver (xl-storage equivalent) is out of scope for
// this core; `Drive` is the seam the local executor calls through.
// Production code wires a real implementation in; tests use `MemDrive`
// below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;

use crate::error::{PeerError, Result};

/// Drive-local record for a volume (bucket).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolInfo {
    pub name: String,
    pub created: DateTime<Utc>,
}

/// Per-drive bucket state observed during heal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveState {
    Ok,
    Missing,
    Corrupt,
    Offline,
}

impl DriveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveState::Ok => "ok",
            DriveState::Missing => "missing",
            DriveState::Corrupt => "corrupt",
            DriveState::Offline => "offline",
        }
    }
}

/// Opaque drive capability: `StatVol`, `MakeVol`, `DeleteVol`,
/// `ListVols`.
#[async_trait]
pub trait Drive: Send + Sync {
    /// Stable identifier used in log lines and heal reports.
    fn id(&self) -> &str;

    /// Whether the drive slot itself is reachable. A drive that is
    /// `offline()` must fail every call with `PeerError::DiskNotFound`
    /// without touching storage.
    fn offline(&self) -> bool;

    async fn stat_vol(&self, bucket: &str) -> Result<VolInfo>;

    async fn make_vol(&self, bucket: &str) -> Result<()>;

    async fn delete_vol(&self, bucket: &str, force: bool) -> Result<()>;

    async fn list_vols(&self) -> Result<Vec<VolInfo>>;
}

/// In-memory `Drive` used by tests and by the `Local` peer-transport
/// variant when no real storage backend is wired in.
pub struct MemDrive {
    id: String,
    offline: AtomicBool,
    vols: RwLock<HashMap<String, VolInfo>>,
    /// Non-empty buckets refuse deletion with `VolumeNotEmpty` unless
    /// `force` is set.
    non_empty: RwLock<std::collections::HashSet<String>>,
}

impl MemDrive {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            offline: AtomicBool::new(false),
            vols: RwLock::new(HashMap::new()),
            non_empty: RwLock::new(std::collections::HashSet::new()),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Test hook: mark a bucket as holding objects, so `delete_vol`
    /// without `force` refuses it.
    pub fn mark_non_empty(&self, bucket: &str) {
        self.non_empty.write().insert(bucket.to_string());
    }

    /// Test hook: seed a volume directly, bypassing `make_vol`.
    pub fn seed(&self, bucket: &str, created: DateTime<Utc>) {
        self.vols.write().insert(
            bucket.to_string(),
            VolInfo { name: bucket.to_string(), created },
        );
    }
}

#[async_trait]
impl Drive for MemDrive {
    fn id(&self) -> &str {
        &self.id
    }

    fn offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    async fn stat_vol(&self, bucket: &str) -> Result<VolInfo> {
        if self.offline() {
            return Err(PeerError::DiskNotFound);
        }
        self.vols
            .read()
            .get(bucket)
            .cloned()
            .ok_or_else(|| PeerError::VolumeNotFound(bucket.to_string()))
    }

    async fn make_vol(&self, bucket: &str) -> Result<()> {
        if self.offline() {
            return Err(PeerError::DiskNotFound);
        }
        let mut vols = self.vols.write();
        if vols.contains_key(bucket) {
            return Err(PeerError::VolumeExists(bucket.to_string()));
        }
        vols.insert(
            bucket.to_string(),
            VolInfo { name: bucket.to_string(), created: Utc::now() },
        );
        Ok(())
    }

    async fn delete_vol(&self, bucket: &str, force: bool) -> Result<()> {
        if self.offline() {
            return Err(PeerError::DiskNotFound);
        }
        if !self.vols.read().contains_key(bucket) {
            return Err(PeerError::VolumeNotFound(bucket.to_string()));
        }
        if !force && self.non_empty.read().contains(bucket) {
            return Err(PeerError::VolumeNotEmpty(bucket.to_string()));
        }
        self.vols.write().remove(bucket);
        self.non_empty.write().remove(bucket);
        Ok(())
    }

    async fn list_vols(&self) -> Result<Vec<VolInfo>> {
        if self.offline() {
            return Err(PeerError::DiskNotFound);
        }
        Ok(self.vols.read().values().cloned().collect())
    }
}
