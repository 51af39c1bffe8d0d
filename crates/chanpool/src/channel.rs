//! A single transport connection and its live-stream counter.

use crate::error::{Error, Result};
use core::fmt;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

/// The maximum number of concurrent streams a single channel may carry.
///
/// HTTP/2 servers commonly advertise a `SETTINGS_MAX_CONCURRENT_STREAMS` of
/// 100. Streams opened beyond that limit are silently queued by the transport
/// and never make progress, so pools refuse them instead.
pub const MAX_CONCURRENT_STREAMS_PER_CHANNEL: usize = 100;

/// One underlying connection able to host up to `max_streams` concurrent
/// streams.
///
/// The stream counter is only ever changed through compare-and-swap loops, so
/// concurrent [`Channel::try_reserve`] calls can never push it past
/// `max_streams` and concurrent [`Channel::release`] calls can never push it
/// below zero.
///
/// Channels are owned by the pool that created them and shared with the
/// leases they issue through an `Arc`.
pub struct Channel<C> {
    id: usize,
    connection: C,
    max_streams: usize,
    #[cfg(feature = "cache-padded")]
    active: crossbeam_utils::CachePadded<AtomicUsize>,
    #[cfg(not(feature = "cache-padded"))]
    active: AtomicUsize,
    closed: AtomicBool,
}

impl<C> Channel<C> {
    /// Wraps an established connection.
    ///
    /// `id` is the channel's position within its pool and is only used for
    /// diagnostics.
    pub fn new(id: usize, connection: C, max_streams: usize) -> Self {
        Self {
            id,
            connection,
            max_streams,
            #[cfg(feature = "cache-padded")]
            active: crossbeam_utils::CachePadded::new(AtomicUsize::new(0)),
            #[cfg(not(feature = "cache-padded"))]
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Attempts to reserve one stream slot.
    ///
    /// Increments the active stream count if and only if it is strictly below
    /// the channel's capacity. Returns `false` and leaves the count untouched
    /// otherwise.
    pub fn try_reserve(&self) -> bool {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.max_streams {
                return false;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns one stream slot to the channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReleaseMisuse`] if no reservation is outstanding. The
    /// counter stays at zero in that case.
    pub fn release(&self) -> Result<()> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current == 0 {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    channel = self.id,
                    "release without an outstanding reservation"
                );
                return Err(Error::ReleaseMisuse { channel: self.id });
            }
            match self.active.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// The number of streams currently reserved on this channel.
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Stream slots still available on this channel.
    pub fn remaining_streams(&self) -> usize {
        self.max_streams.saturating_sub(self.active_streams())
    }

    pub const fn max_streams(&self) -> usize {
        self.max_streams
    }

    pub const fn id(&self) -> usize {
        self.id
    }

    pub const fn connection(&self) -> &C {
        &self.connection
    }

    /// Marks the channel closed and returns the number of leases that were
    /// still outstanding.
    ///
    /// The connection itself is dropped once the owning pool and every
    /// outstanding lease have let go of the channel.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let outstanding = self.active_streams();
        if outstanding > 0 {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                channel = self.id,
                outstanding,
                "closing channel with outstanding stream leases"
            );
        }
        outstanding
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<C> fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("active", &self.active_streams())
            .field("max_streams", &self.max_streams)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
