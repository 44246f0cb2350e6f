// Peer Coordinator.
//
// Holds the ordered peer list (including a local client for self) and
// the pool count. Every public method fans an operation out to every
// peer, groups the per-peer outcomes by pool, and reduces each pool's
// outcomes to a single verdict before combining pool verdicts into the
// cluster answer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::ClusterConfig;
use crate::error::{PeerError, Result};
use crate::node::PoolId;
use crate::queue::{NullPartialOpQueue, PartialOpQueue};
use crate::quorum::{all_not_found, heal_quorum, reduce_quorum_errs, write_quorum};
use crate::transport::PeerClient;
use crate::types::{BucketInfo, BucketOptions, DeleteBucketOptions, HealOptions, HealResult, MakeBucketOptions};

fn err_of<T>(r: &Result<T>) -> Option<PeerError> {
    r.as_ref().err().cloned()
}

pub struct PeerCoordinator {
    peers: Vec<Arc<dyn PeerClient>>,
    pool_count: usize,
    queue: Arc<dyn PartialOpQueue>,
    /// Per-call deadline applied to every peer task in `fan_out`. `None`
    /// means a fan-out runs to completion with no cancellation — the
    /// default, since peer RPC timeouts are already enforced one layer
    /// down by `RemotePeerClient`'s own HTTP client timeout; this is an
    /// additional cluster-operation-wide budget on top of that.
    deadline: parking_lot::RwLock<Option<Duration>>,
}

impl PeerCoordinator {
    pub fn new(peers: Vec<Arc<dyn PeerClient>>, pool_count: usize) -> Self {
        Self {
            peers,
            pool_count,
            queue: Arc::new(NullPartialOpQueue),
            deadline: parking_lot::RwLock::new(None),
        }
    }

    /// Builds a coordinator whose pool count and per-call deadline come
    /// from `config.pool_count`/`config.peer_call_timeout`, so the
    /// cluster-operation budget actually reflects the running config
    /// instead of a caller-picked constant.
    pub fn from_config(peers: Vec<Arc<dyn PeerClient>>, config: &ClusterConfig) -> Self {
        Self::new(peers, config.pool_count).with_deadline(config.peer_call_timeout)
    }

    pub fn with_queue(mut self, queue: Arc<dyn PartialOpQueue>) -> Self {
        self.queue = queue;
        self
    }

    pub fn pool_count(&self) -> usize {
        self.pool_count
    }

    pub fn with_deadline(self, deadline: Duration) -> Self {
        *self.deadline.write() = Some(deadline);
        self
    }

    pub fn set_deadline(&self, deadline: Option<Duration>) {
        *self.deadline.write() = deadline;
    }

    /// Spawns a background task that probes every peer's health on
    /// `interval` and reconnects any peer whose probe succeeds while it
    /// was still marked offline. Returns the task handle so an embedder
    /// can abort it on shutdown; dropping the handle leaves it running.
    pub fn spawn_health_probe(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for peer in &self.peers {
                    if !peer.is_reachable() && peer.health_check().await {
                        peer.reconnect();
                    }
                }
            }
        })
    }

    /// Convenience wrapper reading the probe cadence off `config`.
    pub fn spawn_health_probe_from_config(self: Arc<Self>, config: &ClusterConfig) -> tokio::task::JoinHandle<()> {
        self.spawn_health_probe(config.health_probe_interval)
    }

    fn pool_peer_indices(&self, pool: PoolId) -> Vec<usize> {
        self.peers
            .iter()
            .enumerate()
            .filter(|(_, peer)| peer.pools().contains(&pool))
            .map(|(idx, _)| idx)
            .collect()
    }

    fn pool_outcomes(&self, pool: PoolId, errs: &[Option<PeerError>]) -> Vec<Option<PeerError>> {
        self.pool_peer_indices(pool).into_iter().map(|idx| errs[idx].clone()).collect()
    }

    /// Dispatch `op` to every peer concurrently: one task per peer,
    /// barrier-waits for all before the caller reduces. An unreachable
    /// peer yields the offline error without the op ever running. Every
    /// task races against the configured deadline (if any); a task that
    /// misses it yields `Cancelled`, which quorum reduction treats as an
    /// absent vote exactly like `DiskNotFound`/`PeerOffline` — already
    /// completed sibling tasks keep their real outcomes, so a fan-out
    /// whose surviving subset still meets quorum yields a well-formed
    /// answer rather than failing outright.
    async fn fan_out<T, F, Fut>(&self, op: F) -> Vec<Result<T>>
    where
        F: Fn(Arc<dyn PeerClient>) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = *self.deadline.read();
        let handles: Vec<_> = self
            .peers
            .iter()
            .cloned()
            .map(|peer| {
                let op = op.clone();
                tokio::spawn(async move {
                    if !peer.is_reachable() {
                        return Err(PeerError::PeerOffline);
                    }
                    match deadline {
                        None => op(peer).await,
                        Some(d) => match tokio::time::timeout(d, op(peer)).await {
                            Ok(r) => r,
                            Err(_elapsed) => Err(PeerError::Cancelled),
                        },
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(r) => r,
                Err(_join_err) => Err(PeerError::Internal("peer task panicked".to_string())),
            });
        }
        results
    }

    pub async fn make_bucket(&self, bucket: &str, opts: MakeBucketOptions) -> Result<()> {
        let bucket = bucket.to_string();
        let results = self
            .fan_out(move |peer| {
                let bucket = bucket.clone();
                async move { peer.make_bucket(&bucket, opts).await }
            })
            .await;
        let errs: Vec<Option<PeerError>> = results.iter().map(err_of).collect();

        for pool in 0..self.pool_count {
            let outcomes = self.pool_outcomes(pool, &errs);
            let quorum = write_quorum(outcomes.len());
            if let Some(err) = reduce_quorum_errs(&outcomes, quorum) {
                warn!(pool, %err, "pool lost make-bucket quorum");
                return Err(err);
            }
        }
        Ok(())
    }

    /// A non-`VolumeNotFound` pool failure triggers a compensating
    /// `make_bucket` on every peer before surfacing the error, the
    /// cluster-wide counterpart to the drive-level delete rollback.
    pub async fn delete_bucket(&self, bucket: &str, opts: DeleteBucketOptions) -> Result<()> {
        let bucket_owned = bucket.to_string();
        let results = self
            .fan_out(move |peer| {
                let bucket = bucket_owned.clone();
                async move { peer.delete_bucket(&bucket, opts).await }
            })
            .await;
        let errs: Vec<Option<PeerError>> = results.iter().map(err_of).collect();

        for pool in 0..self.pool_count {
            let outcomes = self.pool_outcomes(pool, &errs);
            let quorum = write_quorum(outcomes.len());
            match reduce_quorum_errs(&outcomes, quorum) {
                None => continue,
                Some(PeerError::VolumeNotFound(_)) => continue,
                Some(err) => {
                    warn!(pool, %err, "pool lost delete-bucket quorum, issuing compensating make-bucket");
                    let _ = self.make_bucket(bucket, MakeBucketOptions::default()).await;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    pub async fn get_bucket_info(&self, bucket: &str, opts: BucketOptions) -> Result<BucketInfo> {
        let bucket_owned = bucket.to_string();
        let results = self
            .fan_out(move |peer| {
                let bucket = bucket_owned.clone();
                async move { peer.get_bucket_info(&bucket, opts).await }
            })
            .await;
        let errs: Vec<Option<PeerError>> = results.iter().map(err_of).collect();

        for pool in 0..self.pool_count {
            let outcomes = self.pool_outcomes(pool, &errs);
            let quorum = heal_quorum(outcomes.len());
            if let Some(err) = reduce_quorum_errs(&outcomes, quorum) {
                warn!(pool, %err, "pool lost get-bucket-info quorum");
                return Err(if all_not_found(&errs) {
                    PeerError::VolumeNotFound(bucket.to_string())
                } else {
                    err
                });
            }
        }

        results
            .into_iter()
            .find_map(std::result::Result::ok)
            .ok_or_else(|| PeerError::VolumeNotFound(bucket.to_string()))
    }

    /// Two-phase: validate every pool has quorum, then merge bucket
    /// names pool-by-pool with lower-numbered pools winning ties and
    /// names that fell short of quorum routed to the partial-op queue.
    pub async fn list_buckets(&self, opts: BucketOptions) -> Result<Vec<BucketInfo>> {
        let results = self.fan_out(move |peer| async move { peer.list_buckets(opts).await }).await;
        let errs: Vec<Option<PeerError>> = results.iter().map(err_of).collect();

        for pool in 0..self.pool_count {
            let outcomes = self.pool_outcomes(pool, &errs);
            let quorum = heal_quorum(outcomes.len());
            if let Some(err) = reduce_quorum_errs(&outcomes, quorum) {
                warn!(pool, %err, "pool lost list-buckets quorum");
                return Err(err);
            }
        }

        let mut merged: std::collections::HashMap<String, BucketInfo> = std::collections::HashMap::new();
        for pool in 0..self.pool_count {
            let peer_indices = self.pool_peer_indices(pool);
            let quorum = heal_quorum(peer_indices.len());

            let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
            let mut seen: std::collections::HashMap<String, BucketInfo> = std::collections::HashMap::new();
            for idx in peer_indices {
                let Ok(buckets) = &results[idx] else { continue };
                for bi in buckets {
                    if merged.contains_key(&bi.name) {
                        continue;
                    }
                    *counts.entry(bi.name.clone()).or_insert(0) += 1;
                    seen.entry(bi.name.clone()).or_insert_with(|| bi.clone());
                }
            }

            for (name, count) in counts {
                if count >= quorum {
                    if let Some(bi) = seen.remove(&name) {
                        merged.insert(name, bi);
                    }
                } else {
                    self.queue.add_partial_op(&name);
                }
            }
        }

        let mut result: Vec<BucketInfo> = merged.into_values().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Two-pass: probe derives `remove`/`recreate` from ground truth
    /// rather than trusting the caller's input, then the mutation
    /// fans out with the derived intent.
    pub async fn heal_bucket(&self, bucket: &str, opts: HealOptions) -> Result<HealResult> {
        let bucket_owned = bucket.to_string();
        let probe_results = self
            .fan_out({
                let bucket = bucket_owned.clone();
                move |peer| {
                    let bucket = bucket.clone();
                    async move { peer.get_bucket_info(&bucket, BucketOptions::default()).await }
                }
            })
            .await;
        let probe_errs: Vec<Option<PeerError>> = probe_results.iter().map(err_of).collect();

        let mut pool_probe_outcomes = Vec::with_capacity(self.pool_count);
        for pool in 0..self.pool_count {
            let outcomes = self.pool_outcomes(pool, &probe_errs);
            let quorum = heal_quorum(outcomes.len());
            pool_probe_outcomes.push(reduce_quorum_errs(&outcomes, quorum));
        }

        let remove = all_not_found(&pool_probe_outcomes);
        let derived_opts = HealOptions { dry_run: opts.dry_run, remove };

        let mutate_results = self
            .fan_out({
                let bucket = bucket_owned.clone();
                move |peer| {
                    let bucket = bucket.clone();
                    async move { peer.heal_bucket(&bucket, derived_opts).await }
                }
            })
            .await;
        let mutate_errs: Vec<Option<PeerError>> = mutate_results.iter().map(err_of).collect();

        let mut every_pool_content = true;
        for pool in 0..self.pool_count {
            let outcomes = self.pool_outcomes(pool, &mutate_errs);
            let quorum = heal_quorum(outcomes.len());
            if reduce_quorum_errs(&outcomes, quorum).is_some() {
                every_pool_content = false;
            }
        }

        if !every_pool_content {
            return Err(PeerError::VolumeNotFound(bucket_owned));
        }

        mutate_results
            .into_iter()
            .find_map(std::result::Result::ok)
            .ok_or_else(|| PeerError::VolumeNotFound(bucket_owned))
    }
}
