/// Default number of stream channels for [`TopicsTransportStrategy::Static`].
pub const DEFAULT_NUM_STREAM_CHANNELS: usize = 4;
/// Default number of unary channels for either strategy.
pub const DEFAULT_NUM_UNARY_CHANNELS: usize = 4;
/// Default stream ceiling for [`TopicsTransportStrategy::Dynamic`].
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 400;

/// How a [`TopicTransport`](crate::TopicTransport) sizes its pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicsTransportStrategy {
    /// Open `num_stream_channels` stream channels up front.
    Static {
        num_stream_channels: usize,
        num_unary_channels: usize,
    },
    /// Start with one stream channel and grow until `max_subscriptions`
    /// concurrent streams fit.
    Dynamic {
        max_subscriptions: usize,
        num_unary_channels: usize,
    },
}

impl TopicsTransportStrategy {
    pub const fn static_default() -> Self {
        Self::Static {
            num_stream_channels: DEFAULT_NUM_STREAM_CHANNELS,
            num_unary_channels: DEFAULT_NUM_UNARY_CHANNELS,
        }
    }

    pub const fn dynamic_default() -> Self {
        Self::Dynamic {
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            num_unary_channels: DEFAULT_NUM_UNARY_CHANNELS,
        }
    }

    pub const fn num_unary_channels(&self) -> usize {
        match *self {
            Self::Static {
                num_unary_channels, ..
            }
            | Self::Dynamic {
                num_unary_channels, ..
            } => num_unary_channels,
        }
    }

    #[must_use]
    pub const fn with_num_unary_channels(self, num_unary_channels: usize) -> Self {
        match self {
            Self::Static {
                num_stream_channels,
                ..
            } => Self::Static {
                num_stream_channels,
                num_unary_channels,
            },
            Self::Dynamic {
                max_subscriptions, ..
            } => Self::Dynamic {
                max_subscriptions,
                num_unary_channels,
            },
        }
    }
}

impl Default for TopicsTransportStrategy {
    fn default() -> Self {
        Self::static_default()
    }
}
