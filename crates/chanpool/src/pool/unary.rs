use crate::{
    error::{Error, Result},
    factory::ChannelFactory,
    pool::PoolId,
};
use core::fmt;
use parking_lot::RwLock;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fixed set of connections for unary calls.
///
/// Unary calls complete on their own and may queue on the transport, so the
/// pool does no capacity accounting: [`UnaryChannelPool::next`] simply hands
/// out connections in round-robin order.
pub struct UnaryChannelPool<C> {
    id: PoolId,
    connections: RwLock<Vec<Arc<C>>>,
    next_connection: AtomicUsize,
}

impl<C> UnaryChannelPool<C>
where
    C: Send + Sync,
{
    /// Eagerly creates `num_channels` connections.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `num_channels` is zero.
    /// - Any error returned by the factory.
    pub fn new<F>(factory: &F, num_channels: usize) -> Result<Self>
    where
        F: ChannelFactory<Connection = C> + ?Sized,
    {
        if num_channels == 0 {
            return Err(Error::invalid_config(
                "number of unary channels must be at least 1",
            ));
        }
        let connections = (0..num_channels)
            .map(|_| factory.connect().map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        let id = PoolId::next();
        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %id, num_channels, "created unary channel pool");

        Ok(Self {
            id,
            connections: RwLock::new(connections),
            next_connection: AtomicUsize::new(0),
        })
    }

    pub const fn id(&self) -> PoolId {
        self.id
    }

    /// Returns the next connection in round-robin order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] after [`Self::close`].
    ///
    /// # Example
    /// ```
    /// use chanpool::UnaryChannelPool;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let created = AtomicUsize::new(0);
    /// let pool = UnaryChannelPool::new(
    ///     &|| Ok::<_, chanpool::Error>(created.fetch_add(1, Ordering::Relaxed)),
    ///     2,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(*pool.next().unwrap(), 0);
    /// assert_eq!(*pool.next().unwrap(), 1);
    /// assert_eq!(*pool.next().unwrap(), 0);
    /// ```
    pub fn next(&self) -> Result<Arc<C>> {
        let connections = self.connections.read();
        if connections.is_empty() {
            return Err(Error::PoolClosed);
        }
        let index = self.next_connection.fetch_add(1, Ordering::Relaxed) % connections.len();
        Ok(Arc::clone(&connections[index]))
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Drops the pool's connections. In-flight calls keep theirs alive until
    /// they finish.
    pub fn close(&self) {
        let _dropped = core::mem::take(&mut *self.connections.write()).len();
        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %self.id, connections = _dropped, "closed unary channel pool");
    }
}

impl<C> fmt::Debug for UnaryChannelPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryChannelPool")
            .field("id", &self.id)
            .field("connections", &self.connections.read().len())
            .finish_non_exhaustive()
    }
}
