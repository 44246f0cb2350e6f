// Peer Transport.
//
// Two variants share one capability set: `Local` never fails with
// "offline" and calls straight into the local executor; `Remote`
// serializes over HTTP and tracks liveness. Expressed as a trait
// rather than an enum with inheritance-style dispatch.

pub mod local;
pub mod remote;

use async_trait::async_trait;

use crate::error::Result;
use crate::node::PoolId;
use crate::types::{BucketInfo, BucketOptions, DeleteBucketOptions, HealOptions, HealResult, MakeBucketOptions};

pub use local::LocalPeerClient;
pub use remote::RemotePeerClient;

#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn list_buckets(&self, opts: BucketOptions) -> Result<Vec<BucketInfo>>;
    async fn get_bucket_info(&self, bucket: &str, opts: BucketOptions) -> Result<BucketInfo>;
    async fn make_bucket(&self, bucket: &str, opts: MakeBucketOptions) -> Result<()>;
    async fn delete_bucket(&self, bucket: &str, opts: DeleteBucketOptions) -> Result<()>;
    async fn heal_bucket(&self, bucket: &str, opts: HealOptions) -> Result<HealResult>;

    fn host(&self) -> &str;
    fn pools(&self) -> Vec<PoolId>;
    fn set_pools(&self, pools: Vec<PoolId>);

    /// Whether this client's underlying connection is usable. `Local`
    /// is always reachable; `Remote` reflects the latched offline flag
    /// set by a failed call.
    fn is_reachable(&self) -> bool {
        true
    }

    /// Active liveness probe, independent of the latched `is_reachable`
    /// flag. `Local` is trivially healthy; `Remote` round-trips its
    /// dedicated health-check request. Used by the coordinator's
    /// periodic probe loop to notice a peer that has come back.
    async fn health_check(&self) -> bool {
        self.is_reachable()
    }

    /// Re-seat a peer once a health check confirms it is reachable
    /// again. No-op unless overridden.
    fn reconnect(&self) {}
}
