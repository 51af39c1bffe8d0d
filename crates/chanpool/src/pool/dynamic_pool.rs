use crate::{
    channel::{Channel, MAX_CONCURRENT_STREAMS_PER_CHANNEL},
    error::{Error, Result},
    factory::ChannelFactory,
    lease::StreamLease,
    pool::{ChannelPool, ChannelSet, PoolId},
};
use core::fmt;
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A pool that starts with a single channel and adds channels on demand.
///
/// When every existing channel is full, a checkout creates one more channel
/// through the pool's [`ChannelFactory`], as long as the current capacity
/// (`channels * max_streams_per_channel`) is still below the configured
/// ceiling. The pool therefore never holds more than
/// `ceil(max_subscriptions / max_streams_per_channel)` channels.
///
/// Growth is serialized by a dedicated mutex. A caller that finds every
/// channel full takes the lock, re-scans the channels, and only creates a new
/// one if they are still full. Concurrent "pool is full" observations
/// therefore collapse into a single growth step. The fast path (a channel has
/// room) never touches the growth lock.
///
/// Channels are never removed once created, even when all their streams end.
///
/// ## Recommended When
/// - The number of concurrent subscriptions varies widely
/// - Idle connections should not be opened speculatively
///
/// ## See Also
/// - [`StaticChannelPool`]
///
/// [`StaticChannelPool`]: crate::StaticChannelPool
pub struct DynamicChannelPool<F>
where
    F: ChannelFactory,
{
    id: PoolId,
    factory: F,
    channels: ChannelSet<F::Connection>,
    grow_lock: Mutex<()>,
    max_subscriptions: usize,
    max_channels: usize,
    max_streams_per_channel: usize,
    closed: AtomicBool,
}

impl<F> DynamicChannelPool<F>
where
    F: ChannelFactory,
{
    /// Creates a pool with one channel that may grow until it can carry
    /// `max_subscriptions` concurrent streams, using
    /// [`MAX_CONCURRENT_STREAMS_PER_CHANNEL`] streams per channel.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `max_subscriptions` is zero.
    /// - Any error returned by the factory while creating the first channel.
    ///
    /// # Example
    /// ```
    /// use chanpool::{ChannelPool, DynamicChannelPool};
    ///
    /// let pool = DynamicChannelPool::new(|| Ok::<_, chanpool::Error>(()), 250).unwrap();
    /// assert_eq!(pool.channel_count(), 1);
    /// assert_eq!(pool.max_channels(), 3);
    ///
    /// let leases: Vec<_> = (0..101).map(|_| pool.checkout().unwrap()).collect();
    /// assert_eq!(pool.channel_count(), 2);
    /// drop(leases);
    /// assert_eq!(pool.channel_count(), 2);
    /// ```
    pub fn new(factory: F, max_subscriptions: usize) -> Result<Self> {
        Self::with_streams_per_channel(factory, max_subscriptions, MAX_CONCURRENT_STREAMS_PER_CHANNEL)
    }

    /// Like [`Self::new`], with an explicit per-channel stream limit.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if either limit is zero.
    /// - Any error returned by the factory while creating the first channel.
    pub fn with_streams_per_channel(
        factory: F,
        max_subscriptions: usize,
        max_streams_per_channel: usize,
    ) -> Result<Self> {
        if max_subscriptions == 0 {
            return Err(Error::invalid_config(
                "maximum concurrent streams must be at least 1",
            ));
        }
        if max_streams_per_channel == 0 {
            return Err(Error::invalid_config(
                "streams per channel must be at least 1",
            ));
        }

        let max_channels = max_subscriptions.div_ceil(max_streams_per_channel);
        let first = Arc::new(Channel::new(0, factory.connect()?, max_streams_per_channel));

        let id = PoolId::next();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            pool = %id,
            max_subscriptions,
            max_channels,
            "created dynamic channel pool"
        );

        Ok(Self {
            id,
            factory,
            channels: ChannelSet::new(vec![first]),
            grow_lock: Mutex::new(()),
            max_subscriptions,
            max_channels,
            max_streams_per_channel,
            closed: AtomicBool::new(false),
        })
    }

    /// The most channels this pool will ever hold.
    pub const fn max_channels(&self) -> usize {
        self.max_channels
    }

    /// The configured stream ceiling the pool grows towards.
    pub const fn max_subscriptions(&self) -> usize {
        self.max_subscriptions
    }

    pub const fn max_streams_per_channel(&self) -> usize {
        self.max_streams_per_channel
    }

    /// Free slots left once the pool has reached its channel ceiling, when
    /// fewer than the low-capacity threshold. `None` while it can still grow.
    #[cfg(any(test, feature = "tracing"))]
    pub(crate) fn low_capacity_remaining(&self) -> Option<usize> {
        if self.channels.len() < self.max_channels {
            return None;
        }
        super::low_capacity_remaining(self)
    }

    fn leased(&self, channel: Arc<Channel<F::Connection>>) -> StreamLease<F::Connection> {
        #[cfg(feature = "tracing")]
        if let Some(remaining) = self.low_capacity_remaining() {
            super::warn_low_capacity(remaining, self.max_concurrent_streams());
        }
        StreamLease::new(channel, self.id)
    }

    /// Slow path of [`ChannelPool::checkout`]: every channel looked full.
    fn grow_and_reserve(&self) -> Result<StreamLease<F::Connection>> {
        let _guard = self.grow_lock.lock();

        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        // Another caller may have grown the pool, or a stream may have ended,
        // while this one waited for the lock.
        if let Some(channel) = self.channels.try_reserve() {
            return Ok(self.leased(channel));
        }

        let count = self.channels.len();
        if count >= self.max_channels {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                pool = %self.id,
                channels = count,
                max_concurrent_streams = count * self.max_streams_per_channel,
                "already at maximum number of concurrent streams"
            );
            return Err(Error::ResourceExhausted {
                max_concurrent_streams: count * self.max_streams_per_channel,
                channels: count,
            });
        }

        let channel = Arc::new(Channel::new(
            count,
            self.factory.connect()?,
            self.max_streams_per_channel,
        ));
        // Reserve before publishing so the caller that paid for the growth
        // is guaranteed a slot on the new channel.
        let reserved = channel.try_reserve();
        debug_assert!(reserved, "a fresh channel must accept a reservation");
        self.channels.push(Arc::clone(&channel));

        #[cfg(feature = "tracing")]
        {
            tracing::debug!(
                pool = %self.id,
                channels = count + 1,
                max_channels = self.max_channels,
                "added channel to dynamic pool"
            );
            if count + 1 == self.max_channels {
                tracing::warn!(
                    pool = %self.id,
                    max_concurrent_streams = self.max_concurrent_streams(),
                    "dynamic pool reached its channel ceiling"
                );
            }
        }

        Ok(self.leased(channel))
    }
}

impl<F> ChannelPool for DynamicChannelPool<F>
where
    F: ChannelFactory,
{
    type Connection = F::Connection;

    fn id(&self) -> PoolId {
        self.id
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self), fields(pool = %self.id)))]
    fn checkout(&self) -> Result<StreamLease<F::Connection>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        if let Some(channel) = self.channels.try_reserve() {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                channel = channel.id(),
                active = channel.active_streams(),
                "reserved stream slot"
            );
            return Ok(self.leased(channel));
        }

        self.grow_and_reserve()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Wait out any in-progress growth so its channel is closed too.
        let _guard = self.grow_lock.lock();
        let _outstanding = self.channels.close_all();
        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %self.id, outstanding = _outstanding, "closed dynamic channel pool");
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

impl<F> fmt::Debug for DynamicChannelPool<F>
where
    F: ChannelFactory,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicChannelPool")
            .field("id", &self.id)
            .field("channels", &self.channels.len())
            .field("max_channels", &self.max_channels)
            .field("max_streams_per_channel", &self.max_streams_per_channel)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
