// Peer-to-peer wire contract.
//
// Paths, query-param names and the binary encoding used for remote
// peer calls. The HTTP router, auth middleware and TLS termination
// that actually serve this path are external collaborators; this
// module only fixes the shape both sides must agree on.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{PeerError, Result};

pub const PEER_S3_PREFIX: &str = "/minio/peer-s3";
pub const PEER_S3_VERSION: &str = "v1";

pub const METHOD_HEALTH: &str = "/health";
pub const METHOD_MAKE_BUCKET: &str = "/make-bucket";
pub const METHOD_GET_BUCKET_INFO: &str = "/get-bucket-info";
pub const METHOD_DELETE_BUCKET: &str = "/delete-bucket";
pub const METHOD_LIST_BUCKETS: &str = "/list-buckets";
pub const METHOD_HEAL_BUCKET: &str = "/heal-bucket";

pub const PARAM_BUCKET: &str = "bucket";
pub const PARAM_BUCKET_DELETED: &str = "bucket-deleted";
pub const PARAM_FORCE_CREATE: &str = "force-create";
pub const PARAM_FORCE_DELETE: &str = "force-delete";

/// `<reserved>/peer-s3/v1/<method>`.
pub fn peer_path(method: &str) -> String {
    format!("{PEER_S3_PREFIX}/{PEER_S3_VERSION}{method}")
}

/// Booleans are URL-encoded as the literals `true`/`false`.
pub fn bool_param(value: bool) -> String {
    value.to_string()
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| PeerError::Internal(format!("wire encode failed: {e}")))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| PeerError::Transport(format!("wire decode failed: {e}")))
}

/// Authorization seam a server-side handler checks before dispatching a
/// peer call. The handler implementation, token format and clock-skew
/// tolerance all live outside this crate; only the contract — reject
/// with `InvalidArgument` before touching the local executor — is
/// fixed here so `RemotePeerClient::call` and a real handler agree on
/// what a 403 means.
pub trait RequestAuthorizer: Send + Sync {
    fn authorize(&self, token: &str) -> Result<()>;
}

/// Authorizer that accepts every request. Used where node-to-node auth
/// is handled by a lower transport layer (e.g. mTLS) instead of a token.
pub struct NullAuthorizer;

impl RequestAuthorizer for NullAuthorizer {
    fn authorize(&self, _token: &str) -> Result<()> {
        Ok(())
    }
}
