use anyhow::bail;
use chanpool_tonic::chanpool::MAX_CONCURRENT_STREAMS_PER_CHANNEL;
use chanpool_tonic::{
    DEFAULT_MAX_SUBSCRIPTIONS, DEFAULT_NUM_STREAM_CHANNELS, DEFAULT_NUM_UNARY_CHANNELS,
    StaticCredentialProvider, TopicsTransportStrategy, TransportConfig,
};
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Which stream pool the transport uses.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// A fixed number of stream channels opened up front.
    Static,
    /// One stream channel that grows up to `--max-subscriptions`.
    Dynamic,
}

/// Runtime configuration for the `chanpool-loadgen` binary.
///
/// Every subscriber opens one synthetic stream on the topic transport and
/// holds it for `--hold-ms`. Subscribers beyond the transport's capacity are
/// refused immediately and counted as exhausted.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chanpool-loadgen",
    version,
    about = "Drives a topic transport with concurrent synthetic subscriptions"
)]
pub struct CliArgs {
    /// Endpoint URI the channels point at. Channels connect lazily, so the
    /// synthetic run never contacts it.
    ///
    /// Environment variable: `CHANPOOL_ENDPOINT`
    #[arg(long, env = "CHANPOOL_ENDPOINT", default_value_t = String::from("http://127.0.0.1:50051"))]
    pub endpoint: String,

    /// Token sent as `authorization` metadata.
    ///
    /// Environment variable: `CHANPOOL_AUTH_TOKEN`
    #[arg(long, env = "CHANPOOL_AUTH_TOKEN", default_value_t = String::from("loadgen"), hide_env_values = true)]
    pub auth_token: String,

    /// Stream pool kind.
    ///
    /// Environment variable: `POOL_KIND`
    #[arg(long, env = "POOL_KIND", value_enum, default_value_t = PoolKind::Static)]
    pub pool: PoolKind,

    /// Stream channels for the static pool.
    ///
    /// Environment variable: `NUM_STREAM_CHANNELS`
    #[arg(long, env = "NUM_STREAM_CHANNELS", default_value_t = DEFAULT_NUM_STREAM_CHANNELS)]
    pub num_stream_channels: usize,

    /// Concurrent stream ceiling for the dynamic pool.
    ///
    /// Environment variable: `MAX_SUBSCRIPTIONS`
    #[arg(long, env = "MAX_SUBSCRIPTIONS", default_value_t = DEFAULT_MAX_SUBSCRIPTIONS)]
    pub max_subscriptions: usize,

    /// Channels reserved for unary calls.
    ///
    /// Environment variable: `NUM_UNARY_CHANNELS`
    #[arg(long, env = "NUM_UNARY_CHANNELS", default_value_t = DEFAULT_NUM_UNARY_CHANNELS)]
    pub num_unary_channels: usize,

    /// Number of concurrent subscribers to launch.
    ///
    /// Environment variable: `SUBSCRIBERS`
    #[arg(long, env = "SUBSCRIBERS", default_value_t = 500)]
    pub subscribers: usize,

    /// How long each admitted subscriber holds its stream, in milliseconds.
    ///
    /// Environment variable: `HOLD_MS`
    #[arg(long, env = "HOLD_MS", default_value_t = 1_000)]
    pub hold_ms: u64,

    /// Interval between synthetic stream items, in milliseconds.
    ///
    /// Environment variable: `TICK_MS`
    #[arg(long, env = "TICK_MS", default_value_t = 100)]
    pub tick_ms: u64,

    /// Disable HTTP/2 keep-alive pings on the channels.
    #[arg(long, default_value_t = false)]
    pub no_keep_alive: bool,

    /// Print the final report as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct LoadgenConfig {
    pub credentials: StaticCredentialProvider,
    pub transport: TransportConfig,
    pub strategy: TopicsTransportStrategy,
    pub subscribers: usize,
    pub hold: Duration,
    pub tick: Duration,
    pub json: bool,
}

impl LoadgenConfig {
    /// Streams the configured pool can carry once fully grown.
    pub fn stream_capacity(&self) -> usize {
        match self.strategy {
            TopicsTransportStrategy::Static {
                num_stream_channels,
                ..
            } => num_stream_channels * MAX_CONCURRENT_STREAMS_PER_CHANNEL,
            TopicsTransportStrategy::Dynamic {
                max_subscriptions, ..
            } => {
                max_subscriptions.div_ceil(MAX_CONCURRENT_STREAMS_PER_CHANNEL)
                    * MAX_CONCURRENT_STREAMS_PER_CHANNEL
            }
        }
    }
}

impl TryFrom<CliArgs> for LoadgenConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.subscribers == 0 {
            bail!("SUBSCRIBERS must be greater than 0");
        }
        if args.num_unary_channels == 0 {
            bail!("NUM_UNARY_CHANNELS must be greater than 0");
        }
        if args.tick_ms == 0 {
            bail!("TICK_MS must be greater than 0");
        }
        if args.hold_ms < args.tick_ms {
            bail!(
                "HOLD_MS ({}) must be at least TICK_MS ({})",
                args.hold_ms,
                args.tick_ms
            );
        }

        let strategy = match args.pool {
            PoolKind::Static => {
                if args.num_stream_channels == 0 {
                    bail!("NUM_STREAM_CHANNELS must be greater than 0");
                }
                TopicsTransportStrategy::Static {
                    num_stream_channels: args.num_stream_channels,
                    num_unary_channels: args.num_unary_channels,
                }
            }
            PoolKind::Dynamic => {
                if args.max_subscriptions == 0 {
                    bail!("MAX_SUBSCRIPTIONS must be greater than 0");
                }
                TopicsTransportStrategy::Dynamic {
                    max_subscriptions: args.max_subscriptions,
                    num_unary_channels: args.num_unary_channels,
                }
            }
        };

        let transport = if args.no_keep_alive {
            TransportConfig::default().with_keep_alive_disabled()
        } else {
            TransportConfig::default()
        };

        Ok(Self {
            credentials: StaticCredentialProvider::new(args.endpoint, args.auth_token),
            transport,
            strategy,
            subscribers: args.subscribers,
            hold: Duration::from_millis(args.hold_ms),
            tick: Duration::from_millis(args.tick_ms),
            json: args.json,
        })
    }
}
