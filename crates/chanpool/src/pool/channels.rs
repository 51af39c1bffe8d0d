use crate::channel::Channel;
use parking_lot::RwLock;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The ordered channel collection shared by the stream pools.
///
/// Selection starts at a rotating index so that sustained load is spread over
/// every channel instead of always filling the first one.
pub(crate) struct ChannelSet<C> {
    channels: RwLock<Vec<Arc<Channel<C>>>>,
    next_channel: AtomicUsize,
}

impl<C> ChannelSet<C> {
    pub(crate) fn new(channels: Vec<Arc<Channel<C>>>) -> Self {
        Self {
            channels: RwLock::new(channels),
            next_channel: AtomicUsize::new(0),
        }
    }

    /// Reserves a slot on the first channel, in round-robin order, that
    /// accepts one.
    pub(crate) fn try_reserve(&self) -> Option<Arc<Channel<C>>> {
        let channels = self.channels.read();
        let len = channels.len();
        if len == 0 {
            return None;
        }
        let start = self.next_channel.fetch_add(1, Ordering::Relaxed) % len;
        (0..len)
            .map(|offset| &channels[(start + offset) % len])
            .find(|channel| channel.try_reserve())
            .map(Arc::clone)
    }

    pub(crate) fn push(&self, channel: Arc<Channel<C>>) {
        self.channels.write().push(channel);
    }

    pub(crate) fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub(crate) fn active_streams(&self) -> usize {
        self.channels
            .read()
            .iter()
            .map(|channel| channel.active_streams())
            .sum()
    }

    /// Removes and closes every channel, returning the number of leases that
    /// were still outstanding.
    pub(crate) fn close_all(&self) -> usize {
        let drained = core::mem::take(&mut *self.channels.write());
        drained.iter().map(|channel| channel.close()).sum()
    }
}
