use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PeerError>;

/// Error taxonomy for the bucket coordination core.
///
/// Variants are deliberately coarse: the core reduces many concrete
/// drive/peer failures down to this small set before anything crosses
/// a quorum boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("drive is offline or unresponsive")]
    DiskNotFound,

    #[error("volume not found: {0}")]
    VolumeNotFound(String),

    #[error("volume already exists: {0}")]
    VolumeExists(String),

    #[error("volume not empty: {0}")]
    VolumeNotEmpty(String),

    #[error("peer is offline")]
    PeerOffline,

    #[error("object layer not yet initialized")]
    ServerNotInitialized,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation cancelled")]
    Cancelled,

    /// Catch-all: either a genuine defect in the reduction logic, or a
    /// pool/drive group that lost quorum without any single concrete
    /// error dominating (every vote was ignored as absent).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PeerError {
    /// Errors that are neither a concrete success nor a concrete
    /// failure during quorum reduction: an "absent vote".
    pub fn is_ignored_for_quorum(&self) -> bool {
        matches!(self, PeerError::DiskNotFound | PeerError::PeerOffline | PeerError::Cancelled)
    }
}

impl From<std::io::Error> for PeerError {
    fn from(err: std::io::Error) -> Self {
        PeerError::Transport(err.to_string())
    }
}
