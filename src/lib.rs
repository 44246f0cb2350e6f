//! Cluster bucket coordination core: two-level quorum (per-drive, then
//! per-peer-pool) over bucket-level metadata operations, with a
//! partial-op hand-off for background repair.

pub mod config;
pub mod coordinator;
pub mod drive;
pub mod error;
pub mod local;
pub mod node;
pub mod queue;
pub mod quorum;
pub mod transport;
pub mod types;
pub mod wire;

pub use config::ClusterConfig;
pub use coordinator::PeerCoordinator;
pub use drive::{Drive, DriveState, MemDrive, VolInfo};
pub use error::{PeerError, Result};
pub use local::LocalDrives;
pub use node::{Node, NodeId, PoolId};
pub use queue::{InMemoryPartialOpQueue, NullPartialOpQueue, PartialOpQueue};
pub use transport::{LocalPeerClient, PeerClient, RemotePeerClient};
pub use types::{
    BucketInfo, BucketOptions, DeleteBucketOptions, HealOptions, HealResult, MakeBucketOptions, PartialOp,
};
pub use wire::{NullAuthorizer, RequestAuthorizer};
