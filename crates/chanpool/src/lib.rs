//! Stream-capacity pools for multiplexed RPC transports.
//!
//! HTTP/2 connections cap how many streams may be open at once. This crate
//! spreads long-lived streams (topic subscriptions, for example) over a set
//! of [`Channel`]s, refusing new streams once every channel is at capacity
//! instead of letting the transport queue them silently.
//!
//! - [`StaticChannelPool`] opens a fixed number of channels up front.
//! - [`DynamicChannelPool`] starts with one channel and grows on demand up to
//!   a ceiling.
//! - [`UnaryChannelPool`] round-robins unary calls over a fixed set.
//! - [`StreamLease`] returns its slot when released or dropped, and
//!   `LeasedStream` ties a lease to the stream it carries.
//! - [`is_retryable`] and the [`RetryStrategy`] implementations answer
//!   whether a failed call may be resubmitted.
//!
//! The crate is transport-agnostic: connections are produced by a
//! [`ChannelFactory`].
//!
//! ## Feature Flags
//! - `futures`: `LeasedStream`. Enabled by default.
//! - `tracing`: emit `tracing` events for growth, exhaustion and misuse.
//! - `cache-padded`: pad each channel's stream counter to a cache line.

mod channel;
mod error;
mod factory;
mod lease;
mod pool;
mod retry;
#[cfg(feature = "futures")]
mod stream;

pub use crate::channel::*;
pub use crate::error::*;
pub use crate::factory::*;
pub use crate::lease::*;
pub use crate::pool::*;
pub use crate::retry::*;
#[cfg(feature = "futures")]
pub use crate::stream::*;

#[cfg(doctest)]
#[doc = include_str!("../README.md")]
struct ReadmeDoctests;
