// Cluster configuration.
//
// Plain struct with a `Default` impl, assembled by whatever embeds this
// crate (CLI flags, a config file, environment) and handed to the
// coordinator at construction time. No global state: every call site
// that needs a timeout or concurrency cap takes it as a parameter or
// reads it off a `ClusterConfig` it was given.

use std::time::Duration;

use crate::node::Node;

/// Bound on simultaneous local-drive fan-out per call (the local
/// executor's `buffered()` width).
pub const DEFAULT_LOCAL_DRIVE_CONCURRENCY: usize = 32;

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Ordered peer list, including the local node.
    pub nodes: Vec<Node>,
    pub pool_count: usize,
    pub local_drive_concurrency: usize,
    pub peer_call_timeout: Duration,
    pub health_probe_interval: Duration,
    pub health_probe_timeout: Duration,
}

impl ClusterConfig {
    pub fn new(nodes: Vec<Node>, pool_count: usize) -> Self {
        Self {
            nodes,
            pool_count,
            local_drive_concurrency: DEFAULT_LOCAL_DRIVE_CONCURRENCY,
            peer_call_timeout: Duration::from_secs(10),
            health_probe_interval: Duration::from_secs(5),
            health_probe_timeout: Duration::from_secs(2),
        }
    }

    pub fn local_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_local)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new(Vec::new(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_carries_sane_defaults() {
        let cfg = ClusterConfig::new(vec![Node::new("node-a", true, vec![0])], 1);
        assert_eq!(cfg.local_drive_concurrency, DEFAULT_LOCAL_DRIVE_CONCURRENCY);
        assert_eq!(cfg.local_node().unwrap().host, "node-a");
    }

    #[tokio::test]
    async fn local_drives_from_config_honors_concurrency_cap() {
        use crate::drive::{Drive, MemDrive};
        use crate::local::LocalDrives;
        use std::sync::Arc;

        let mut cfg = ClusterConfig::new(vec![Node::new("node-a", true, vec![0])], 1);
        cfg.local_drive_concurrency = 4;
        let drives: Vec<Arc<dyn Drive>> = vec![Arc::new(MemDrive::new("d0"))];
        let registry = LocalDrives::from_config(drives, &cfg);
        assert_eq!(registry.concurrency(), 4);
    }

    #[test]
    fn coordinator_from_config_carries_pool_count_and_deadline() {
        use crate::coordinator::PeerCoordinator;
        use crate::transport::LocalPeerClient;
        use crate::local::LocalDrives;
        use crate::drive::{Drive, MemDrive};
        use std::sync::Arc;

        let cfg = ClusterConfig::new(vec![Node::new("node-a", true, vec![0])], 3);
        let drives: Vec<Arc<dyn Drive>> = vec![Arc::new(MemDrive::new("d0"))];
        let peer = Arc::new(LocalPeerClient::new("node-a", vec![0], Arc::new(LocalDrives::new(drives))));
        let coordinator = PeerCoordinator::from_config(vec![peer], &cfg);
        assert_eq!(coordinator.pool_count(), 3);
    }
}
