//! # Telemetry
//!
//! Console logging is always installed through `tracing-subscriber`. Log
//! events from the pools are emitted when the `tracing` feature is on.
//!
//! ## Feature matrix
//!
//! - `tracing`: Emits log events from the binary and the pools.
//! - `metrics`: Enables OpenTelemetry metrics for checkouts, exhausted
//!   checkouts, opened channels and active leases.
//! - `stdout`: Exports metrics to stdout every 5 seconds.
//!
//! ## Example usage
//!
//! ```bash
//! RUST_LOG=debug cargo run -p chanpool-loadgen --features metrics,stdout -- --pool dynamic
//! ```

#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires 'metrics' to be enabled.");

use tracing_subscriber::{
    EnvFilter, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt,
};

#[cfg(feature = "metrics")]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Meter, UpDownCounter},
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::{Resource, metrics as sdkmetrics};
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes pending metrics and stops the exporter. Failures are printed to
    /// stderr.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        for (step, outcome) in [
            ("flush", self.meter_provider.force_flush()),
            ("shutdown", self.meter_provider.shutdown()),
        ] {
            if let Err(err) = outcome {
                eprintln!("metrics {step} failed: {err}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_timer(ChronoLocal::rfc_3339());
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()?;

    #[cfg(feature = "metrics")]
    {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let scope = InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        init_metric_handles(&opentelemetry::global::meter_with_scope(scope));
    }

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "stdout")]
const EXPORT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let version = KeyValue::new(semvcns::resource::SERVICE_VERSION, env!("CARGO_PKG_VERSION"));
    let resource = Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_schema_url([version], semvcns::SCHEMA_URL)
        .build();
    let provider = sdkmetrics::SdkMeterProvider::builder().with_resource(resource);

    #[cfg(feature = "stdout")]
    let provider = provider.with_reader(
        sdkmetrics::PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
            .with_interval(EXPORT_INTERVAL)
            .build(),
    );

    provider.build()
}

/// Pool activity observed by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    /// A subscriber obtained a stream slot.
    CheckedOut,
    /// A checkout was refused at capacity.
    Exhausted,
    /// The stream pool grew by this many channels.
    ChannelsOpened(u64),
    /// A held slot was given back.
    Released,
}

#[cfg(feature = "metrics")]
struct PoolMetrics {
    checkouts: Counter<u64>,
    exhausted: Counter<u64>,
    channels_opened: Counter<u64>,
    active_leases: UpDownCounter<i64>,
}

#[cfg(feature = "metrics")]
static POOL_METRICS: OnceLock<PoolMetrics> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = POOL_METRICS.set(PoolMetrics {
        checkouts: meter
            .u64_counter("chanpool.checkouts")
            .with_description("Stream slots handed out")
            .build(),
        exhausted: meter
            .u64_counter("chanpool.checkouts.exhausted")
            .with_description("Checkouts refused because every channel was full")
            .build(),
        channels_opened: meter
            .u64_counter("chanpool.channels.opened")
            .with_description("Stream channels created by the pool")
            .build(),
        active_leases: meter
            .i64_up_down_counter("chanpool.leases.active")
            .with_description("Stream slots currently held")
            .build(),
    });
}

/// Records `event`. A no-op until [`init_telemetry`] ran, or without the
/// `metrics` feature.
#[cfg(feature = "metrics")]
pub fn record(event: PoolEvent) {
    let Some(m) = POOL_METRICS.get() else {
        return;
    };
    match event {
        PoolEvent::CheckedOut => {
            m.checkouts.add(1, &[]);
            m.active_leases.add(1, &[]);
        }
        PoolEvent::Exhausted => m.exhausted.add(1, &[]),
        PoolEvent::ChannelsOpened(n) => m.channels_opened.add(n, &[]),
        PoolEvent::Released => m.active_leases.add(-1, &[]),
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record(_event: PoolEvent) {}
