use crate::{
    credentials::CredentialProvider,
    error::{Error, Result},
    transport::TransportConfig,
};
use chanpool::ChannelFactory;
use core::fmt;
use tonic::{
    Request, Status,
    metadata::AsciiMetadataValue,
    service::{Interceptor, interceptor::InterceptedService},
    transport::{Channel, Endpoint},
};

/// Adds the `authorization` metadata to every outgoing request.
#[derive(Clone)]
pub struct AuthInterceptor {
    token: AsciiMetadataValue,
}

impl AuthInterceptor {
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the token is not valid header
    /// content.
    pub fn new(token: &str) -> Result<Self> {
        let mut token: AsciiMetadataValue = token.parse().map_err(|_| Error::Credentials {
            reason: "auth token is not valid ASCII metadata".into(),
        })?;
        token.set_sensitive(true);
        Ok(Self { token })
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> core::result::Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert("authorization", self.token.clone());
        Ok(request)
    }
}

impl fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInterceptor").finish_non_exhaustive()
    }
}

/// One gRPC channel plus what a generated client needs to use it.
#[derive(Clone, Debug)]
pub struct GrpcConnection {
    channel: Channel,
    auth: AuthInterceptor,
    max_send_message_size: usize,
    max_receive_message_size: usize,
}

impl GrpcConnection {
    /// The raw channel, without authentication.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// The channel wrapped so every request carries the auth token. Pass it
    /// to a generated client's `new`.
    pub fn authenticated(&self) -> InterceptedService<Channel, AuthInterceptor> {
        InterceptedService::new(self.channel.clone(), self.auth.clone())
    }

    pub fn interceptor(&self) -> AuthInterceptor {
        self.auth.clone()
    }

    pub const fn max_send_message_size(&self) -> usize {
        self.max_send_message_size
    }

    pub const fn max_receive_message_size(&self) -> usize {
        self.max_receive_message_size
    }
}

/// Produces lazily-connected [`GrpcConnection`]s to one endpoint.
///
/// The endpoint is parsed and configured once. Each
/// [`connect`](ChannelFactory::connect) returns immediately; the underlying
/// HTTP/2 connection is established on first use, so it is safe to call while
/// a pool holds its growth lock. It must be called from within a Tokio
/// runtime.
#[derive(Clone, Debug)]
pub struct TonicChannelFactory {
    endpoint: Endpoint,
    auth: AuthInterceptor,
    config: TransportConfig,
}

impl TonicChannelFactory {
    /// # Errors
    ///
    /// - [`Error::InvalidEndpoint`] if the provider's endpoint is unusable.
    /// - [`Error::Credentials`] if the auth token is not valid metadata.
    pub fn new<P>(credentials: &P, config: &TransportConfig) -> Result<Self>
    where
        P: CredentialProvider + ?Sized,
    {
        Ok(Self {
            endpoint: config.endpoint(credentials.endpoint(), credentials.is_secure())?,
            auth: AuthInterceptor::new(credentials.auth_token())?,
            config: config.clone(),
        })
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl ChannelFactory for TonicChannelFactory {
    type Connection = GrpcConnection;

    fn connect(&self) -> chanpool::Result<GrpcConnection> {
        #[cfg(feature = "tracing")]
        tracing::debug!(uri = %self.endpoint.uri(), "creating lazy gRPC channel");
        Ok(GrpcConnection {
            channel: self.endpoint.connect_lazy(),
            auth: self.auth.clone(),
            max_send_message_size: self.config.max_send_message_size(),
            max_receive_message_size: self.config.max_receive_message_size(),
        })
    }
}
