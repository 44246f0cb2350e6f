// Cluster-level integration tests for the peer coordinator.
//
// Each "peer" here is a `LocalPeerClient` wrapping its own in-memory
// drive set, so a multi-pool cluster can be assembled without any real
// network or disk. This mirrors how the local-transport variant is
// meant to be used in a single-process deployment.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use peer_s3_core::{
    BucketInfo, BucketOptions, DeleteBucketOptions, Drive, HealOptions, HealResult, InMemoryPartialOpQueue,
    LocalDrives, LocalPeerClient, MakeBucketOptions, MemDrive, PeerClient, PeerCoordinator, PeerError, PoolId,
};

struct TestHarness {
    coordinator: PeerCoordinator,
    queue: Arc<InMemoryPartialOpQueue>,
}

impl TestHarness {
    /// `pools` is one entry per pool: the number of peers in that pool,
    /// each peer backed by `drives_per_peer` in-memory drives.
    fn new(pools: &[usize], drives_per_peer: usize) -> Self {
        let mut peers: Vec<Arc<dyn PeerClient>> = Vec::new();
        for (pool_idx, &peer_count) in pools.iter().enumerate() {
            for p in 0..peer_count {
                let drives: Vec<Arc<dyn Drive>> = (0..drives_per_peer)
                    .map(|d| Arc::new(MemDrive::new(format!("pool{pool_idx}-peer{p}-drive{d}"))) as Arc<dyn Drive>)
                    .collect();
                let local_drives = Arc::new(LocalDrives::new(drives));
                let client = LocalPeerClient::new(format!("pool{pool_idx}-peer{p}"), vec![pool_idx], local_drives);
                peers.push(Arc::new(client));
            }
        }

        let queue = Arc::new(InMemoryPartialOpQueue::new());
        let coordinator = PeerCoordinator::new(peers, pools.len()).with_queue(queue.clone());
        Self { coordinator, queue }
    }
}

#[tokio::test]
async fn make_then_get_bucket_info_round_trips_across_two_pools() {
    let harness = TestHarness::new(&[3, 3], 2);

    harness
        .coordinator
        .make_bucket("alpha", MakeBucketOptions::default())
        .await
        .unwrap();

    let info = harness
        .coordinator
        .get_bucket_info("alpha", BucketOptions::default())
        .await
        .unwrap();
    assert_eq!(info.name, "alpha");
}

#[tokio::test]
async fn get_bucket_info_reports_not_found_before_creation() {
    let harness = TestHarness::new(&[3, 3], 2);

    let err = harness
        .coordinator
        .get_bucket_info("ghost", BucketOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PeerError::VolumeNotFound(_)));
}

#[tokio::test]
async fn delete_with_majority_of_peers_refusing_rolls_back_cluster_wide() {
    // Built directly against the underlying drive sets (rather than
    // through `TestHarness`) so the test can mark individual peers'
    // storage non-empty without the coordinator exposing internals.
    let mem_drives: Vec<Vec<Arc<MemDrive>>> = (0..3)
        .map(|p| (0..2).map(|d| Arc::new(MemDrive::new(format!("peer{p}-drive{d}")))).collect())
        .collect();
    let mut peers: Vec<Arc<dyn PeerClient>> = Vec::new();
    for (p, drives) in mem_drives.iter().enumerate() {
        let as_dyn: Vec<Arc<dyn Drive>> = drives.iter().cloned().map(|d| d as Arc<dyn Drive>).collect();
        let local_drives = Arc::new(LocalDrives::new(as_dyn));
        peers.push(Arc::new(LocalPeerClient::new(format!("peer{p}"), vec![0], local_drives)));
    }
    let coordinator = PeerCoordinator::new(peers, 1);
    coordinator.make_bucket("beta", MakeBucketOptions::default()).await.unwrap();

    for d in &mem_drives[0] {
        d.mark_non_empty("beta");
    }
    for d in &mem_drives[1] {
        d.mark_non_empty("beta");
    }

    let result = coordinator.delete_bucket("beta", DeleteBucketOptions::default()).await;
    assert!(matches!(result, Err(PeerError::VolumeNotEmpty(_))));

    // Rolled back: every peer should still report the bucket present.
    let info = coordinator.get_bucket_info("beta", BucketOptions::default()).await;
    assert!(info.is_ok(), "compensating make-bucket must restore the cluster-wide view");
}

#[tokio::test]
async fn list_buckets_merges_quorum_admitted_names_across_pools() {
    let harness = TestHarness::new(&[3, 3], 1);

    harness.coordinator.make_bucket("alpha", MakeBucketOptions::default()).await.unwrap();
    harness.coordinator.make_bucket("beta", MakeBucketOptions::default()).await.unwrap();

    let listed = harness.coordinator.list_buckets(BucketOptions::default()).await.unwrap();
    let names: Vec<_> = listed.iter().map(|b| b.name.as_str()).collect();
    assert!(names.contains(&"alpha"));
    assert!(names.contains(&"beta"));
    assert!(harness.queue.is_empty(), "fully-admitted names must not hit the partial-op queue");
}

#[tokio::test]
async fn heal_bucket_removes_dangling_copy_when_every_pool_reports_absent() {
    let harness = TestHarness::new(&[3], 2);

    let res = harness.coordinator.heal_bucket("dangling", HealOptions::default()).await.unwrap();
    assert!(res.after.iter().all(|s| *s != peer_s3_core::DriveState::Ok));
}

#[tokio::test]
async fn heal_bucket_recreates_missing_copies_when_bucket_is_confirmed_present() {
    let harness = TestHarness::new(&[3], 2);

    harness.coordinator.make_bucket("alpha", MakeBucketOptions::default()).await.unwrap();

    let res = harness.coordinator.heal_bucket("alpha", HealOptions::default()).await.unwrap();
    assert!(res.after.iter().all(|s| *s == peer_s3_core::DriveState::Ok));
}

#[tokio::test]
async fn list_with_lost_quorum_in_one_pool_omits_bucket_and_enqueues_partial_op() {
    // 4 peers in a single pool, but only 1 reports "delta" — short of
    // heal quorum (floor(4/2) = 2) — so it must be omitted from the
    // merged list and routed to the partial-op queue exactly once.
    let mem_drives: Vec<Arc<MemDrive>> =
        (0..4).map(|p| Arc::new(MemDrive::new(format!("peer{p}-drive0")))).collect();
    let mut peers: Vec<Arc<dyn PeerClient>> = Vec::new();
    for (p, drive) in mem_drives.iter().enumerate() {
        let as_dyn: Vec<Arc<dyn Drive>> = vec![drive.clone() as Arc<dyn Drive>];
        peers.push(Arc::new(LocalPeerClient::new(format!("peer{p}"), vec![0], Arc::new(LocalDrives::new(as_dyn)))));
    }
    mem_drives[0].make_vol("delta").await.unwrap();
    let queue = Arc::new(InMemoryPartialOpQueue::new());
    let coordinator = PeerCoordinator::new(peers, 1).with_queue(queue.clone());

    let listed = coordinator.list_buckets(BucketOptions::default()).await.unwrap();
    assert!(listed.iter().all(|b| b.name != "delta"), "sub-quorum bucket must be omitted");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.drain()[0].bucket, "delta");
}

/// Wraps a `PeerClient` and sleeps before delegating, to exercise the
/// coordinator's per-call deadline without a real slow network peer.
struct DelayedPeerClient {
    inner: Arc<dyn PeerClient>,
    delay: Duration,
}

#[async_trait]
impl PeerClient for DelayedPeerClient {
    async fn list_buckets(&self, opts: BucketOptions) -> peer_s3_core::Result<Vec<BucketInfo>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_buckets(opts).await
    }

    async fn get_bucket_info(&self, bucket: &str, opts: BucketOptions) -> peer_s3_core::Result<BucketInfo> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_bucket_info(bucket, opts).await
    }

    async fn make_bucket(&self, bucket: &str, opts: MakeBucketOptions) -> peer_s3_core::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.make_bucket(bucket, opts).await
    }

    async fn delete_bucket(&self, bucket: &str, opts: DeleteBucketOptions) -> peer_s3_core::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_bucket(bucket, opts).await
    }

    async fn heal_bucket(&self, bucket: &str, opts: HealOptions) -> peer_s3_core::Result<HealResult> {
        tokio::time::sleep(self.delay).await;
        self.inner.heal_bucket(bucket, opts).await
    }

    fn host(&self) -> &str {
        self.inner.host()
    }

    fn pools(&self) -> Vec<PoolId> {
        self.inner.pools()
    }

    fn set_pools(&self, pools: Vec<PoolId>) {
        self.inner.set_pools(pools)
    }

    fn is_reachable(&self) -> bool {
        self.inner.is_reachable()
    }
}

fn solo_peer(host: &str) -> Arc<dyn PeerClient> {
    let drives: Vec<Arc<dyn Drive>> = vec![Arc::new(MemDrive::new(format!("{host}-d0")))];
    Arc::new(LocalPeerClient::new(host.to_string(), vec![0], Arc::new(LocalDrives::new(drives))))
}

#[tokio::test]
async fn cancelled_fan_out_still_succeeds_when_surviving_subset_meets_quorum() {
    // 3 peers, one pool: 2 respond instantly, 1 is slow enough to miss
    // the deadline. Write quorum for k=3 is 2, so the timed-out peer's
    // `Cancelled` outcome (an absent vote) must not stop the pool from
    // succeeding.
    let peers: Vec<Arc<dyn PeerClient>> = vec![
        solo_peer("fast-a"),
        solo_peer("fast-b"),
        Arc::new(DelayedPeerClient { inner: solo_peer("slow-c"), delay: Duration::from_millis(200) }),
    ];
    let coordinator = PeerCoordinator::new(peers, 1).with_deadline(Duration::from_millis(20));

    let result = coordinator.make_bucket("alpha", MakeBucketOptions::default()).await;
    assert!(result.is_ok(), "quorum met by the two prompt peers despite one cancellation");
}

#[tokio::test]
async fn cancelled_fan_out_fails_when_surviving_subset_misses_quorum() {
    // Same shape, but 2 of 3 peers are slow: only 1 prompt response
    // survives the deadline, short of write quorum (2).
    let peers: Vec<Arc<dyn PeerClient>> = vec![
        solo_peer("fast-a"),
        Arc::new(DelayedPeerClient { inner: solo_peer("slow-b"), delay: Duration::from_millis(200) }),
        Arc::new(DelayedPeerClient { inner: solo_peer("slow-c"), delay: Duration::from_millis(200) }),
    ];
    let coordinator = PeerCoordinator::new(peers, 1).with_deadline(Duration::from_millis(20));

    let result = coordinator.make_bucket("alpha", MakeBucketOptions::default()).await;
    assert!(result.is_err(), "quorum lost once two of three peers are cancelled");
}
