//! Error types for the town registry.
//!
//! [`TownError`] covers the expected, caller-recoverable outcomes of registry
//! operations. [`StorageError`] covers failures reading or writing the backing
//! files; it never escapes load (which degrades to a partial or empty
//! registry) and is surfaced by save so the host can log it.

use std::path::PathBuf;
use thiserror::Error;

/// Rejection reasons for registry operations.
///
/// Every variant is detected before any state is touched, so receiving one
/// guarantees the registry is unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TownError {
    #[error("a town with that name already exists")]
    NameTaken,

    #[error("town names must be a single word of 1 to {max} characters")]
    InvalidName { max: usize },

    #[error("player already belongs to a town")]
    AlreadyAffiliated,

    #[error("player does not belong to a town")]
    NotAffiliated,

    #[error("no such town")]
    NotFound,

    #[error("only the town leader may do this")]
    NotLeader,

    #[error("player is not a member of this town")]
    NotMember,

    #[error("player is already a member of this town")]
    AlreadyMember,

    #[error("that town is invite-only")]
    NotInvited,

    #[error("no invite from that town")]
    NoSuchInvite,

    #[error("leadership must be transferred before leaving")]
    SoleLeaderMustTransfer,

    #[error("that rank change is not allowed")]
    InvalidTransition,

    #[error("only leaders and officers may manage claims")]
    Forbidden,

    #[error("chunk is already claimed")]
    AlreadyClaimed,

    #[error("town does not claim this chunk")]
    NotClaimed,

    #[error("claim limit reached ({current}/{limit})")]
    LimitReached { current: usize, limit: usize },

    #[error("description exceeds {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("message of the day exceeds {max} characters")]
    MotdTooLong { max: usize },
}

/// Convenience alias for registry results.
pub type TownResult<T> = Result<T, TownError>;

/// Failures of the durable backing store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
