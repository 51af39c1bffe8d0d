//! Construction of new channel connections.

use crate::error::Result;

/// Produces new connections for a pool.
///
/// A factory captures everything needed to reach the service (endpoint,
/// credentials, transport tuning) at construction time, so `connect` takes no
/// arguments. It holds no shared mutable state and may be called from any
/// thread.
///
/// `connect` must not block on network I/O: the dynamic pool calls it while
/// holding its growth lock. Lazily-connecting transports (such as
/// `tonic::transport::Endpoint::connect_lazy`) fit this contract.
pub trait ChannelFactory: Send + Sync {
    /// The connection handle stored in each channel.
    type Connection: Send + Sync;

    /// Establishes a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) if the
    /// connection cannot be set up.
    fn connect(&self) -> Result<Self::Connection>;
}

impl<F, C> ChannelFactory for F
where
    F: Fn() -> Result<C> + Send + Sync,
    C: Send + Sync,
{
    type Connection = C;

    fn connect(&self) -> Result<C> {
        self()
    }
}
