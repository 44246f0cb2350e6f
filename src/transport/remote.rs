// RPC-over-HTTP peer transport variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use tracing::warn;
use url::Url;

use crate::config::ClusterConfig;
use crate::error::{PeerError, Result};
use crate::node::PoolId;
use crate::types::{BucketInfo, BucketOptions, DeleteBucketOptions, HealOptions, HealResult, MakeBucketOptions};
use crate::wire;

use super::PeerClient;

/// Remote peer. `alive` latches to `false` on the first transport-level
/// failure and never flips back except through `reconnect`, which this
/// core exposes but never calls itself — re-seating a dead peer is an
/// external procedure.
pub struct RemotePeerClient {
    host: String,
    base_url: Url,
    pools: RwLock<Vec<PoolId>>,
    client: reqwest::Client,
    health_client: reqwest::Client,
    alive: AtomicBool,
}

impl RemotePeerClient {
    pub fn new(host: impl Into<String>, tls: bool, call_timeout: Duration, health_timeout: Duration) -> Result<Self> {
        let host = host.into();
        let scheme = if tls { "https" } else { "http" };
        let base_url = Url::parse(&format!("{scheme}://{host}"))
            .map_err(|e| PeerError::InvalidArgument(format!("bad peer host {host}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| PeerError::Internal(format!("failed to build peer http client: {e}")))?;

        // Separate instance so the health probe never recurses through
        // the same connection state the main call path just marked dead.
        let health_client = reqwest::Client::builder()
            .timeout(health_timeout)
            .build()
            .map_err(|e| PeerError::Internal(format!("failed to build peer health client: {e}")))?;

        Ok(Self {
            host,
            base_url,
            pools: RwLock::new(Vec::new()),
            client,
            health_client,
            alive: AtomicBool::new(true),
        })
    }

    /// Builds a peer client whose HTTP timeouts come from
    /// `config.peer_call_timeout`/`config.health_probe_timeout` rather
    /// than caller-picked durations, so the config is the one place the
    /// cluster's RPC and probe budgets are set.
    pub fn from_config(host: impl Into<String>, tls: bool, config: &ClusterConfig) -> Result<Self> {
        Self::new(host, tls, config.peer_call_timeout, config.health_probe_timeout)
    }

    fn mark_offline(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            warn!(host = %self.host, "peer marked offline after transport failure");
        }
    }

    /// Re-seat a peer once an external reconnect procedure has
    /// verified it. Never called from within this crate.
    pub fn reconnect(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Health probe on the dedicated `health_client`. Healthy iff the
    /// request round-trips at all — any HTTP response (even a non-2xx
    /// one) means the network path works and the failure, if any, is
    /// at the application layer.
    pub async fn health_check(&self) -> bool {
        let Ok(url) = self.base_url.join(&wire::peer_path(wire::METHOD_HEALTH)) else {
            return false;
        };
        self.health_client.post(url).send().await.is_ok()
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Vec<u8>> {
        if !self.is_reachable() {
            return Err(PeerError::PeerOffline);
        }

        let url = self
            .base_url
            .join(&wire::peer_path(method))
            .map_err(|e| PeerError::Internal(format!("bad peer path: {e}")))?;

        let response = self
            .client
            .post(url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                self.mark_offline();
                PeerError::Transport(e.to_string())
            })?;

        match response.status() {
            StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(PeerError::InvalidArgument(body))
            }
            status if status.is_success() => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| PeerError::Transport(e.to_string())),
            status => Err(PeerError::Transport(format!("peer returned status {status}"))),
        }
    }
}

#[async_trait]
impl PeerClient for RemotePeerClient {
    async fn list_buckets(&self, opts: BucketOptions) -> Result<Vec<BucketInfo>> {
        let params = [(wire::PARAM_BUCKET_DELETED, wire::bool_param(opts.deleted))];
        let body = self.call(wire::METHOD_LIST_BUCKETS, &params).await?;
        wire::decode(&body)
    }

    async fn get_bucket_info(&self, bucket: &str, opts: BucketOptions) -> Result<BucketInfo> {
        let params = [
            (wire::PARAM_BUCKET, bucket.to_string()),
            (wire::PARAM_BUCKET_DELETED, wire::bool_param(opts.deleted)),
        ];
        let body = self.call(wire::METHOD_GET_BUCKET_INFO, &params).await?;
        wire::decode(&body)
    }

    async fn make_bucket(&self, bucket: &str, opts: MakeBucketOptions) -> Result<()> {
        let params = [
            (wire::PARAM_BUCKET, bucket.to_string()),
            (wire::PARAM_FORCE_CREATE, wire::bool_param(opts.force_create)),
        ];
        self.call(wire::METHOD_MAKE_BUCKET, &params).await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str, opts: DeleteBucketOptions) -> Result<()> {
        let params = [
            (wire::PARAM_BUCKET, bucket.to_string()),
            (wire::PARAM_FORCE_DELETE, wire::bool_param(opts.force)),
        ];
        self.call(wire::METHOD_DELETE_BUCKET, &params).await?;
        Ok(())
    }

    async fn heal_bucket(&self, bucket: &str, opts: HealOptions) -> Result<HealResult> {
        // The wire table's `bucket-deleted` param is reused here to carry
        // `opts.remove` rather than a `BucketOptions.deleted` flag — the
        // heal RPC has no separate "include tombstones" concept, and
        // this is the one boolean `HealOptions` needs a handler to see
        // (`dry_run` never crosses the wire; it only matters locally).
        let params = [
            (wire::PARAM_BUCKET, bucket.to_string()),
            (wire::PARAM_BUCKET_DELETED, wire::bool_param(opts.remove)),
        ];
        let body = self.call(wire::METHOD_HEAL_BUCKET, &params).await?;
        wire::decode(&body)
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

    fn is_reachable(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn health_check(&self) -> bool {
        RemotePeerClient::health_check(self).await
    }

    fn reconnect(&self) {
        RemotePeerClient::reconnect(self)
    }
}
