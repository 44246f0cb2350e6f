// In-process peer transport variant.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{PeerError, Result};
use crate::local::{self, LocalDrives};
use crate::node::{is_meta_bucket, PoolId};
use crate::types::{BucketInfo, BucketOptions, DeleteBucketOptions, HealOptions, HealResult, MakeBucketOptions};

use super::PeerClient;

pub struct LocalPeerClient {
    host: String,
    pools: RwLock<Vec<PoolId>>,
    drives: Arc<LocalDrives>,
}

impl LocalPeerClient {
    pub fn new(host: impl Into<String>, pools: Vec<PoolId>, drives: Arc<LocalDrives>) -> Self {
        Self { host: host.into(), pools: RwLock::new(pools), drives }
    }
}

#[async_trait]
impl PeerClient for LocalPeerClient {
    async fn list_buckets(&self, opts: BucketOptions) -> Result<Vec<BucketInfo>> {
        let snapshot = self.drives.snapshot();
        local::list_buckets_local(&snapshot, self.drives.concurrency(), opts).await
    }

    async fn get_bucket_info(&self, bucket: &str, opts: BucketOptions) -> Result<BucketInfo> {
        let snapshot = self.drives.snapshot();
        local::get_bucket_info_local(&snapshot, self.drives.concurrency(), bucket, opts).await
    }

    async fn make_bucket(&self, bucket: &str, opts: MakeBucketOptions) -> Result<()> {
        let snapshot = self.drives.snapshot();
        local::make_bucket_local(&snapshot, self.drives.concurrency(), bucket, opts).await
    }

    async fn delete_bucket(&self, bucket: &str, opts: DeleteBucketOptions) -> Result<()> {
        if is_meta_bucket(bucket) {
            return Err(PeerError::InvalidArgument(format!("cannot delete reserved bucket {bucket}")));
        }
        let snapshot = self.drives.snapshot();
        local::delete_bucket_local(&snapshot, self.drives.concurrency(), bucket, opts).await
    }

    async fn heal_bucket(&self, bucket: &str, opts: HealOptions) -> Result<HealResult> {
        if is_meta_bucket(bucket) {
            return Err(PeerError::InvalidArgument(format!("cannot heal reserved bucket {bucket}")));
        }
        let snapshot = self.drives.snapshot();
        local::heal_bucket_local(&snapshot, self.drives.concurrency(), bucket, opts).await
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn pools(&self) -> Vec<PoolId> {
        self.pools.read().clone()
    }

    fn set_pools(&self, pools: Vec<PoolId>) {
        *self.pools.write() = pools;
    }
}
