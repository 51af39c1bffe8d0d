use crate::{
    channel::{Channel, MAX_CONCURRENT_STREAMS_PER_CHANNEL},
    error::{Error, Result},
    factory::ChannelFactory,
    lease::StreamLease,
    pool::{ChannelPool, ChannelSet, PoolId},
};
use core::fmt;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A fixed-size pool of channels established at construction time.
///
/// The pool admits at most `num_channels * max_streams_per_channel`
/// concurrent streams. Each checkout starts its search at a rotating channel
/// index and reserves on the first channel with spare capacity.
///
/// ## Recommended When
/// - The expected number of concurrent subscriptions is known up front
/// - Connection setup cost should be paid once, at startup
///
/// ## See Also
/// - [`DynamicChannelPool`]
///
/// [`DynamicChannelPool`]: crate::DynamicChannelPool
pub struct StaticChannelPool<C> {
    id: PoolId,
    channels: ChannelSet<C>,
    num_channels: usize,
    max_streams_per_channel: usize,
    closed: AtomicBool,
}

impl<C> StaticChannelPool<C>
where
    C: Send + Sync,
{
    /// Eagerly creates `num_channels` channels, each carrying up to
    /// [`MAX_CONCURRENT_STREAMS_PER_CHANNEL`] streams.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `num_channels` is zero.
    /// - Any error returned by the factory while creating a channel.
    ///
    /// # Example
    /// ```
    /// use chanpool::{ChannelPool, StaticChannelPool};
    ///
    /// let pool = StaticChannelPool::new(&|| Ok::<_, chanpool::Error>(()), 2).unwrap();
    /// let lease = pool.checkout().unwrap();
    /// assert_eq!(pool.active_stream_count(), 1);
    /// pool.release(lease).unwrap();
    /// assert_eq!(pool.active_stream_count(), 0);
    /// ```
    pub fn new<F>(factory: &F, num_channels: usize) -> Result<Self>
    where
        F: ChannelFactory<Connection = C> + ?Sized,
    {
        Self::with_streams_per_channel(factory, num_channels, MAX_CONCURRENT_STREAMS_PER_CHANNEL)
    }

    /// Like [`Self::new`], with an explicit per-channel stream limit.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if either limit is zero.
    /// - Any error returned by the factory while creating a channel.
    pub fn with_streams_per_channel<F>(
        factory: &F,
        num_channels: usize,
        max_streams_per_channel: usize,
    ) -> Result<Self>
    where
        F: ChannelFactory<Connection = C> + ?Sized,
    {
        if num_channels == 0 {
            return Err(Error::invalid_config("number of channels must be at least 1"));
        }
        if max_streams_per_channel == 0 {
            return Err(Error::invalid_config(
                "streams per channel must be at least 1",
            ));
        }

        let channels = (0..num_channels)
            .map(|id| {
                factory
                    .connect()
                    .map(|conn| Arc::new(Channel::new(id, conn, max_streams_per_channel)))
            })
            .collect::<Result<Vec<_>>>()?;

        let id = PoolId::next();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            pool = %id,
            num_channels,
            max_streams_per_channel,
            "created static channel pool"
        );

        Ok(Self {
            id,
            channels: ChannelSet::new(channels),
            num_channels,
            max_streams_per_channel,
            closed: AtomicBool::new(false),
        })
    }

    pub const fn max_streams_per_channel(&self) -> usize {
        self.max_streams_per_channel
    }

    /// Free slots left, when fewer than the low-capacity threshold.
    #[cfg(any(test, feature = "tracing"))]
    pub(crate) fn low_capacity_remaining(&self) -> Option<usize> {
        super::low_capacity_remaining(self)
    }

    fn exhausted(&self) -> Error {
        Error::ResourceExhausted {
            max_concurrent_streams: self.max_concurrent_streams(),
            channels: self.num_channels,
        }
    }
}

impl<C> ChannelPool for StaticChannelPool<C>
where
    C: Send + Sync,
{
    type Connection = C;

    fn id(&self) -> PoolId {
        self.id
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self), fields(pool = %self.id)))]
    fn checkout(&self) -> Result<StreamLease<C>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        let Some(channel) = self.channels.try_reserve() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                max_concurrent_streams = self.max_concurrent_streams(),
                "all channels at capacity"
            );
            return Err(self.exhausted());
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(
            channel = channel.id(),
            active = channel.active_streams(),
            "reserved stream slot"
        );

        #[cfg(feature = "tracing")]
        if let Some(remaining) = self.low_capacity_remaining() {
            super::warn_low_capacity(remaining, self.max_concurrent_streams());
        }

        Ok(StreamLease::new(channel, self.id))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _outstanding = self.channels.close_all();
        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %self.id, outstanding = _outstanding, "closed static channel pool");
    }

    fn active_stream_count(&self) -> usize {
        self.channels.active_streams()
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn max_concurrent_streams(&self) -> usize {
        self.channels.len() * self.max_streams_per_channel
    }
}

impl<C> fmt::Debug for StaticChannelPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticChannelPool")
            .field("id", &self.id)
            .field("num_channels", &self.num_channels)
            .field("max_streams_per_channel", &self.max_streams_per_channel)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
