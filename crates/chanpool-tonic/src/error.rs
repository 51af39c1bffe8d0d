//! Error types for the tonic binding.
//!
//! Wraps [`chanpool::Error`] and adds failures that only occur when talking
//! to a real endpoint. `From<Error>` for [`tonic::Status`] lets callers return
//! pool failures from their own gRPC handlers with a meaningful code.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Checkout, release or pool construction failed.
    #[error(transparent)]
    Pool(#[from] chanpool::Error),

    /// The endpoint URI or its transport settings were rejected.
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    /// Credentials were missing or not usable as request metadata.
    #[error("invalid credentials: {reason}")]
    Credentials { reason: String },

    /// The caller's stream opener failed. The lease was released.
    #[error("failed to open stream: {}", .0.message())]
    Open(Status),
}

impl Error {
    /// Returns `true` when the stream pool had no capacity left.
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::Pool(e) if e.is_resource_exhausted())
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Pool(e) => pool_status(&e),
            Error::InvalidEndpoint { reason } => Status::invalid_argument(reason),
            Error::Credentials { reason } => Status::unauthenticated(reason),
            Error::Open(status) => status,
        }
    }
}

fn pool_status(err: &chanpool::Error) -> Status {
    use chanpool::Error as E;
    match err {
        E::ResourceExhausted { .. } => Status::resource_exhausted(err.to_string()),
        E::Connection { .. } | E::PoolClosed => Status::unavailable(err.to_string()),
        E::InvalidConfig { reason } => Status::invalid_argument(reason.clone()),
        _ => Status::internal(err.to_string()),
    }
}
