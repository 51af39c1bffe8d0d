//! Stream-capacity pools.
//!
//! A pool multiplexes many logical streams onto a bounded number of
//! [`Channel`]s, each of which may carry at most a fixed number of concurrent
//! streams. Two flavours share the [`ChannelPool`] interface:
//!
//! - [`StaticChannelPool`] - a fixed set of channels established up front.
//! - [`DynamicChannelPool`] - starts with one channel and grows on demand up
//!   to a ceiling. Channels are never removed.
//!
//! [`UnaryChannelPool`] serves unary calls, which do not hold stream capacity,
//! by plain round-robin.
//!
//! Admission is non-blocking: `checkout` either reserves a slot immediately or
//! fails with [`Error::ResourceExhausted`].
//!
//! [`Channel`]: crate::Channel
//! [`Error::ResourceExhausted`]: crate::Error::ResourceExhausted

mod channels;
mod dynamic_pool;
mod static_pool;
#[cfg(test)]
mod tests;
mod unary;

pub use dynamic_pool::*;
pub use static_pool::*;
pub use unary::*;

pub(crate) use channels::ChannelSet;

use crate::{
    error::{Error, Result},
    lease::StreamLease,
};
use core::fmt;
use portable_atomic::{AtomicU64, Ordering};

/// Below this many free stream slots a pool that cannot grow logs a warning.
#[cfg(any(test, feature = "tracing"))]
pub(crate) const LOW_CAPACITY_WARNING_THRESHOLD: usize = 10;

/// Free slots left in a pool that can no longer grow, when fewer than
/// [`LOW_CAPACITY_WARNING_THRESHOLD`].
#[cfg(any(test, feature = "tracing"))]
pub(crate) fn low_capacity_remaining<P>(pool: &P) -> Option<usize>
where
    P: ChannelPool + ?Sized,
{
    let remaining = pool
        .max_concurrent_streams()
        .saturating_sub(pool.active_stream_count());
    (remaining < LOW_CAPACITY_WARNING_THRESHOLD).then_some(remaining)
}

#[cfg(feature = "tracing")]
fn warn_low_capacity(remaining: usize, max_concurrent_streams: usize) {
    tracing::warn!(
        remaining,
        max_concurrent_streams,
        "approaching maximum concurrent stream limit"
    );
}

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pool, recorded in every lease it issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Common interface of stream-capacity pools.
pub trait ChannelPool: Send + Sync {
    /// The connection handle carried by the pool's channels.
    type Connection: Send + Sync;

    fn id(&self) -> PoolId;

    /// Reserves one stream slot on some channel.
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceExhausted`] if every channel is full and the pool
    ///   cannot grow.
    /// - [`Error::Connection`] if the pool tried to grow and the new channel
    ///   could not be established.
    /// - [`Error::PoolClosed`] after [`ChannelPool::close`].
    fn checkout(&self) -> Result<StreamLease<Self::Connection>>;

    /// Returns a lease to the pool.
    ///
    /// Dropping the lease has the same effect; this method additionally
    /// reports misuse.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignLease`] if the lease was issued by a different
    /// pool. The lease is still released against its own channel when it is
    /// dropped, so no counter is corrupted.
    fn release(&self, lease: StreamLease<Self::Connection>) -> Result<()> {
        if lease.pool_id() != self.id() {
            #[cfg(feature = "tracing")]
            tracing::error!(
                lease_pool = %lease.pool_id(),
                pool = %self.id(),
                "lease released to the wrong pool"
            );
            return Err(Error::ForeignLease {
                lease_pool: lease.pool_id(),
                pool: self.id(),
            });
        }
        lease.release()
    }

    /// Closes every channel. Subsequent checkouts fail with
    /// [`Error::PoolClosed`].
    ///
    /// Close is final and is not required to interleave safely with
    /// concurrent checkouts.
    fn close(&self);

    /// Sum of active streams over all channels.
    fn active_stream_count(&self) -> usize;

    fn channel_count(&self) -> usize;

    /// Current capacity: `channel_count * max_streams_per_channel`.
    fn max_concurrent_streams(&self) -> usize;
}
