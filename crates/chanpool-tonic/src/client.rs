use crate::{
    credentials::CredentialProvider,
    error::{Error, Result},
    factory::{GrpcConnection, TonicChannelFactory},
    strategy::TopicsTransportStrategy,
    transport::TransportConfig,
};
use chanpool::{
    ChannelFactory, ChannelPool, DynamicChannelPool, LeasedStream, StaticChannelPool,
    StreamLease, UnaryChannelPool,
};
use core::fmt;
use std::{future::Future, sync::Arc};
use tonic::Status;

/// The transport behind a topic client.
///
/// Subscriptions are long-lived server streams and draw from a
/// stream-capacity pool sized by [`TopicsTransportStrategy`]. Publishes are
/// unary calls and are spread round-robin over a separate set of channels
/// that does no capacity accounting.
pub struct TopicTransport<C = GrpcConnection> {
    streams: Box<dyn ChannelPool<Connection = C>>,
    unary: UnaryChannelPool<C>,
}

impl TopicTransport<GrpcConnection> {
    /// Builds both pools against the provider's endpoint.
    ///
    /// Must be called from within a Tokio runtime, since channels are created
    /// with `connect_lazy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or credentials are unusable, or if
    /// the strategy asks for zero channels.
    pub fn connect<P>(
        credentials: &P,
        config: &TransportConfig,
        strategy: TopicsTransportStrategy,
    ) -> Result<Self>
    where
        P: CredentialProvider + ?Sized,
    {
        Self::with_factory(TonicChannelFactory::new(credentials, config)?, strategy)
    }
}

impl<C> TopicTransport<C>
where
    C: Send + Sync + 'static,
{
    /// Builds both pools from `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pool`] if the strategy asks for zero channels or the
    /// factory fails.
    pub fn with_factory<F>(factory: F, strategy: TopicsTransportStrategy) -> Result<Self>
    where
        F: ChannelFactory<Connection = C> + 'static,
    {
        let unary = UnaryChannelPool::new(&factory, strategy.num_unary_channels())?;
        let streams: Box<dyn ChannelPool<Connection = C>> = match strategy {
            TopicsTransportStrategy::Static {
                num_stream_channels,
                ..
            } => Box::new(StaticChannelPool::new(&factory, num_stream_channels)?),
            TopicsTransportStrategy::Dynamic {
                max_subscriptions, ..
            } => Box::new(DynamicChannelPool::new(factory, max_subscriptions)?),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            ?strategy,
            stream_pool = %streams.id(),
            unary_pool = %unary.id(),
            "topic transport ready"
        );

        Ok(Self { streams, unary })
    }

    /// Reserves a stream slot for a subscription.
    ///
    /// # Errors
    ///
    /// Fails immediately when no slot is available; see
    /// [`ChannelPool::checkout`].
    pub fn checkout(&self) -> Result<StreamLease<C>> {
        Ok(self.streams.checkout()?)
    }

    /// Returns a lease obtained from [`Self::checkout`].
    ///
    /// # Errors
    ///
    /// Returns an error if the lease came from another transport.
    pub fn release(&self, lease: StreamLease<C>) -> Result<()> {
        Ok(self.streams.release(lease)?)
    }

    /// Reserves a slot, opens a stream on its connection with `open`, and
    /// binds the two together.
    ///
    /// If `open` fails the slot is released before returning. On success the
    /// slot is released when the returned stream ends or is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Pool`] if no slot is available.
    /// - [`Error::Open`] with the opener's status.
    pub async fn open_stream<S, Open, Fut>(&self, open: Open) -> Result<LeasedStream<S, C>>
    where
        Open: FnOnce(&C) -> Fut,
        Fut: Future<Output = core::result::Result<S, Status>>,
    {
        let lease = self.streams.checkout()?;
        match open(lease.connection()).await {
            Ok(stream) => Ok(LeasedStream::new(stream, lease)),
            Err(status) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    channel = lease.channel_id(),
                    code = ?status.code(),
                    "stream open failed, releasing lease"
                );
                self.streams.release(lease)?;
                Err(Error::Open(status))
            }
        }
    }

    /// A connection for a unary call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pool`] once the transport is closed.
    pub fn unary(&self) -> Result<Arc<C>> {
        Ok(self.unary.next()?)
    }

    pub fn active_stream_count(&self) -> usize {
        self.streams.active_stream_count()
    }

    pub fn stream_channel_count(&self) -> usize {
        self.streams.channel_count()
    }

    pub fn max_concurrent_streams(&self) -> usize {
        self.streams.max_concurrent_streams()
    }

    /// Closes both pools.
    pub fn close(&self) {
        self.streams.close();
        self.unary.close();
        #[cfg(feature = "tracing")]
        tracing::info!("topic transport closed");
    }
}

impl<C: Send + Sync> fmt::Debug for TopicTransport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicTransport")
            .field("stream_pool", &self.streams.id())
            .field("active_streams", &self.streams.active_stream_count())
            .field("stream_channels", &self.streams.channel_count())
            .field("unary", &self.unary)
            .finish()
    }
}
