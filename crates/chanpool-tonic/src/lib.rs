//! # `chanpool-tonic`: gRPC transport for stream-capacity pools
//!
//! Binds [`chanpool`] to [`tonic`]. Channels are created with
//! [`Endpoint::connect_lazy`](tonic::transport::Endpoint::connect_lazy), so
//! growing a pool never blocks on the network.
//!
//! ## Module Overview
//!
//! - [`CredentialProvider`] - Where to connect and how to authenticate.
//! - [`TransportConfig`] - Keep-alive, timeouts and message size limits.
//! - [`TonicChannelFactory`] - A [`chanpool::ChannelFactory`] producing
//!   [`GrpcConnection`]s.
//! - [`TopicsTransportStrategy`] - Static or dynamic stream pool sizing.
//! - [`TopicTransport`] - Stream and unary pools for a topic client.
//! - [`Error`] - Errors with a `From<Error> for tonic::Status` mapping.

mod client;
mod credentials;
mod error;
mod factory;
mod status;
mod strategy;
mod transport;

pub use crate::client::*;
pub use crate::credentials::*;
pub use crate::error::*;
pub use crate::factory::*;
pub use crate::status::*;
pub use crate::strategy::*;
pub use crate::transport::*;
// Public re-export so downstream crates can reach the pool types via
// `chanpool_tonic::chanpool`
pub use chanpool;
