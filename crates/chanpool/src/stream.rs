//! Streams that hold their channel's stream slot for as long as they run.

use crate::lease::StreamLease;
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// A stream bound to the [`StreamLease`] it was opened on.
    ///
    /// The lease is released as soon as the inner stream ends (yields
    /// `None`). If the stream is dropped before that, for example because the
    /// subscriber cancelled or the task was aborted, the lease is released on
    /// drop instead. Either way the slot is returned exactly once.
    #[must_use = "streams do nothing unless polled"]
    pub struct LeasedStream<S, C> {
        #[pin]
        inner: S,
        lease: Option<StreamLease<C>>,
    }
}

impl<S, C> LeasedStream<S, C> {
    pub fn new(inner: S, lease: StreamLease<C>) -> Self {
        Self {
            inner,
            lease: Some(lease),
        }
    }

    /// The lease, until the inner stream has ended.
    pub fn lease(&self) -> Option<&StreamLease<C>> {
        self.lease.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.lease.is_none()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Splits into the inner stream and the lease, if it has not been
    /// released yet. The caller takes over responsibility for the lease.
    pub fn into_parts(self) -> (S, Option<StreamLease<C>>) {
        let Self { inner, lease } = self;
        (inner, lease)
    }
}

impl<S, C> Stream for LeasedStream<S, C>
where
    S: Stream,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(None) => {
                if let Some(lease) = this.lease.take() {
                    if let Err(_e) = lease.release() {
                        #[cfg(feature = "tracing")]
                        tracing::error!("failed to release lease of finished stream: {_e}");
                    }
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S, C> fmt::Debug for LeasedStream<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeasedStream")
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}
