//! Leases on channel stream capacity.

use crate::{channel::Channel, error::Result, pool::PoolId};
use core::fmt;
use std::sync::Arc;

/// A reservation of one stream slot on one [`Channel`].
///
/// A lease is created by a successful
/// [`ChannelPool::checkout`](crate::ChannelPool::checkout) and must be given
/// back exactly once when the stream it carries terminates, whether that is a
/// graceful end, an I/O error, or a cancellation. Two mechanisms enforce this:
///
/// - [`StreamLease::release`] consumes the lease, so the same handle cannot be
///   released twice.
/// - Dropping an unreleased lease releases it, which covers early returns,
///   `?` propagation, task cancellation and panics.
///
/// A leaked lease (for example through [`core::mem::forget`]) permanently
/// removes one slot from the pool.
#[must_use = "dropping a lease immediately releases its stream slot"]
pub struct StreamLease<C> {
    channel: Arc<Channel<C>>,
    pool: PoolId,
    released: bool,
}

impl<C> StreamLease<C> {
    /// Wraps a slot that has already been reserved on `channel`.
    pub(crate) fn new(channel: Arc<Channel<C>>, pool: PoolId) -> Self {
        Self {
            channel,
            pool,
            released: false,
        }
    }

    /// The connection on which the stream should be opened.
    pub fn connection(&self) -> &C {
        self.channel.connection()
    }

    pub fn channel_id(&self) -> usize {
        self.channel.id()
    }

    pub const fn pool_id(&self) -> PoolId {
        self.pool
    }

    /// Returns the stream slot to its channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReleaseMisuse`](crate::Error::ReleaseMisuse) if the
    /// channel had no outstanding reservation, which indicates the counter was
    /// released through some other path.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.channel.release()
    }
}

impl<C> Drop for StreamLease<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(_e) = self.channel.release() {
            #[cfg(feature = "tracing")]
            tracing::error!("failed to release dropped stream lease: {_e}");
        }
    }
}

impl<C> fmt::Debug for StreamLease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamLease")
            .field("pool", &self.pool)
            .field("channel", &self.channel.id())
            .finish_non_exhaustive()
    }
}
