//! Connection-level tuning for gRPC channels.

use crate::error::{Error, Result};
use core::time::Duration;
use tonic::transport::Endpoint;

/// Largest message a client sends or accepts by default, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 5_243_000;

/// HTTP/2 keep-alive settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepAlive {
    /// How often a PING frame is sent.
    pub interval: Duration,
    /// How long to wait for the PING acknowledgement before closing.
    pub timeout: Duration,
    /// Keep pinging while no stream is open.
    pub while_idle: bool,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
            while_idle: true,
        }
    }
}

/// Transport settings applied to every channel a pool creates.
///
/// Message size limits are not endpoint settings in tonic; they travel with
/// each [`GrpcConnection`](crate::GrpcConnection) so generated clients can
/// apply them through `max_encoding_message_size` and
/// `max_decoding_message_size`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    max_send_message_size: usize,
    max_receive_message_size: usize,
    keep_alive: Option<KeepAlive>,
    client_timeout: Duration,
    connect_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_send_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_receive_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            keep_alive: Some(KeepAlive::default()),
            client_timeout: Duration::from_secs(15),
            connect_timeout: None,
        }
    }
}

impl TransportConfig {
    pub const fn max_send_message_size(&self) -> usize {
        self.max_send_message_size
    }

    pub const fn max_receive_message_size(&self) -> usize {
        self.max_receive_message_size
    }

    pub const fn keep_alive(&self) -> Option<KeepAlive> {
        self.keep_alive
    }

    /// Deadline applied to each request on the channel.
    pub const fn client_timeout(&self) -> Duration {
        self.client_timeout
    }

    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    #[must_use]
    pub fn with_max_message_size(&self, bytes: usize) -> Self {
        Self {
            max_send_message_size: bytes,
            max_receive_message_size: bytes,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_keep_alive(&self, keep_alive: KeepAlive) -> Self {
        Self {
            keep_alive: Some(keep_alive),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_keep_alive_disabled(&self) -> Self {
        Self {
            keep_alive: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_client_timeout(&self, timeout: Duration) -> Self {
        Self {
            client_timeout: timeout,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_connect_timeout(&self, timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
            ..self.clone()
        }
    }

    /// Builds a tonic [`Endpoint`] for `uri` with these settings, using TLS
    /// when `secure` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `uri` cannot be parsed, or if
    /// `secure` is set and the `tls` feature is disabled.
    pub fn endpoint(&self, uri: &str, secure: bool) -> Result<Endpoint> {
        let mut endpoint = Endpoint::from_shared(uri.to_owned())
            .map_err(|e| Error::InvalidEndpoint {
                reason: format!("{uri}: {e}"),
            })?
            .timeout(self.client_timeout);

        if let Some(keep_alive) = self.keep_alive {
            endpoint = endpoint
                .http2_keep_alive_interval(keep_alive.interval)
                .keep_alive_timeout(keep_alive.timeout)
                .keep_alive_while_idle(keep_alive.while_idle);
        }
        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }

        if secure {
            #[cfg(feature = "tls")]
            {
                endpoint = endpoint
                    .tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots())
                    .map_err(|e| Error::InvalidEndpoint {
                        reason: format!("{uri}: {e}"),
                    })?;
            }
            #[cfg(not(feature = "tls"))]
            return Err(Error::InvalidEndpoint {
                reason: format!("{uri}: TLS endpoints require the `tls` feature"),
            });
        }

        Ok(endpoint)
    }
}
