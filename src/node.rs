// Cluster topology types.
//
// Kept deliberately small: a `Node` here only carries what the peer
// coordinator needs to fan out and quorum-reduce — host identity,
// locality and pool membership. Anything about *how* a peer is
// reached lives in `transport`.

use serde::{Deserialize, Serialize};

pub type NodeId = String;
pub type PoolId = usize;

/// A peer in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub host: NodeId,
    pub is_local: bool,
    pub pools: Vec<PoolId>,
}

impl Node {
    pub fn new(host: impl Into<String>, is_local: bool, pools: Vec<PoolId>) -> Self {
        assert!(!pools.is_empty(), "a node must belong to at least one pool");
        Self { host: host.into(), is_local, pools }
    }

    pub fn in_pool(&self, pool: PoolId) -> bool {
        self.pools.contains(&pool)
    }
}

/// Reserved bucket name for system metadata.
/// Heal and delete reject this name before dispatching to the local
/// executor; heal treats it as always-`Ok` without statting.
pub const RESERVED_META_BUCKET: &str = ".peer-s3.sys";

pub fn is_meta_bucket(bucket: &str) -> bool {
    bucket == RESERVED_META_BUCKET
}

/// Path prefix under which deleted-bucket tombstones live.
pub const DELETED_BUCKETS_PREFIX: &str = "buckets/.deleted/";

pub fn deleted_bucket_path(bucket: &str) -> String {
    format!("{DELETED_BUCKETS_PREFIX}{bucket}")
}
