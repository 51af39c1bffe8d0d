//! Error types for channel pools and stream leases.
//!
//! Every failure surfaced by a pool is returned synchronously from the call
//! that caused it. [`Error::ResourceExhausted`] is the expected, non-fatal
//! admission failure and is kept distinct from transport failures so callers
//! can decide whether to back off, queue, or surface it to their own caller.

use crate::pool::PoolId;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for channel pools.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// No channel has spare stream capacity and the pool cannot grow.
    #[error(
        "cannot start new stream: all {channels} channels are at capacity \
         ({max_concurrent_streams} concurrent streams allowed)"
    )]
    ResourceExhausted {
        max_concurrent_streams: usize,
        channels: usize,
    },

    /// A channel could not be established.
    #[error("connection error: {reason}")]
    Connection { reason: String },

    /// A release with no matching reservation on the channel.
    #[error("release on channel {channel} without an outstanding reservation")]
    ReleaseMisuse { channel: usize },

    /// A lease was handed back to a pool that did not issue it.
    #[error("lease issued by pool {lease_pool} was released to pool {pool}")]
    ForeignLease { lease_pool: PoolId, pool: PoolId },

    /// Construction parameters were rejected.
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The pool has been closed and no longer hands out channels.
    #[error("pool is closed")]
    PoolClosed,
}

impl Error {
    /// Returns `true` for the admission-control failure.
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Returns `true` when the caller misused the lease API.
    pub const fn is_misuse(&self) -> bool {
        matches!(self, Self::ReleaseMisuse { .. } | Self::ForeignLease { .. })
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
