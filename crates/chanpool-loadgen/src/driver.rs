use crate::{
    config::LoadgenConfig,
    telemetry::{self, PoolEvent},
};
use chanpool_tonic::TopicTransport;
use futures::stream::{FuturesUnordered, StreamExt as FuturesStreamExt};
use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};
use tokio_stream::{StreamExt as TokioStreamExt, wrappers::IntervalStream};
use tokio_util::sync::CancellationToken;

/// How one subscriber's attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    /// Held a stream and received `items` synthetic messages.
    Admitted { items: u64 },
    /// Refused because the pool was at capacity.
    Exhausted,
    /// Any other failure.
    Failed(String),
}

/// Summary of a load run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub subscribers: usize,
    pub admitted: usize,
    pub exhausted: usize,
    pub failed: usize,
    pub items_received: u64,
    pub peak_active_streams: usize,
    pub final_active_streams: usize,
    pub stream_channels: usize,
    pub max_concurrent_streams: usize,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

impl RunReport {
    pub fn print_table(&self) {
        println!("{:<24} | {:>10}", "Metric", "Value");
        println!("{}", "-".repeat(37));
        for (label, value) in [
            ("subscribers", self.subscribers.to_string()),
            ("admitted", self.admitted.to_string()),
            ("exhausted", self.exhausted.to_string()),
            ("failed", self.failed.to_string()),
            ("items received", self.items_received.to_string()),
            ("peak active streams", self.peak_active_streams.to_string()),
            ("final active streams", self.final_active_streams.to_string()),
            ("stream channels", self.stream_channels.to_string()),
            ("max concurrent streams", self.max_concurrent_streams.to_string()),
            ("elapsed (ms)", self.elapsed_ms.to_string()),
            ("cancelled", self.cancelled.to_string()),
        ] {
            println!("{label:<24} | {value:>10}");
        }
    }
}

/// Shared between subscriber tasks to track pool high-water marks.
#[derive(Default)]
struct Watermarks {
    peak_active: AtomicUsize,
    channels_seen: AtomicUsize,
}

impl Watermarks {
    fn observe<C>(&self, transport: &TopicTransport<C>)
    where
        C: Send + Sync + 'static,
    {
        self.peak_active
            .fetch_max(transport.active_stream_count(), Ordering::Relaxed);

        let channels = transport.stream_channel_count();
        let previous = self.channels_seen.fetch_max(channels, Ordering::Relaxed);
        if channels > previous {
            telemetry::record(PoolEvent::ChannelsOpened((channels - previous) as u64));
        }
    }
}

/// Launches every subscriber, waits for all of them, and reports.
pub async fn run<C>(
    transport: Arc<TopicTransport<C>>,
    config: &LoadgenConfig,
    cancel: CancellationToken,
) -> RunReport
where
    C: Send + Sync + 'static,
{
    let start = Instant::now();
    let watermarks = Arc::new(Watermarks::default());
    watermarks.observe(&transport);

    let mut tasks = FuturesUnordered::new();
    for _ in 0..config.subscribers {
        let transport = Arc::clone(&transport);
        let watermarks = Arc::clone(&watermarks);
        let cancel = cancel.clone();
        let (hold, tick) = (config.hold, config.tick);
        tasks.push(tokio::spawn(async move {
            subscribe(&transport, &watermarks, hold, tick, &cancel).await
        }));
    }

    let mut report = RunReport {
        subscribers: config.subscribers,
        ..RunReport::default()
    };
    while let Some(joined) = FuturesStreamExt::next(&mut tasks).await {
        match joined {
            Ok(Outcome::Admitted { items }) => {
                report.admitted += 1;
                report.items_received += items;
            }
            Ok(Outcome::Exhausted) => report.exhausted += 1,
            Ok(Outcome::Failed(_reason)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("subscriber failed: {_reason}");
                report.failed += 1;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("subscriber task panicked: {_e}");
                report.failed += 1;
            }
        }
    }

    report.peak_active_streams = watermarks.peak_active.load(Ordering::Relaxed);
    report.final_active_streams = transport.active_stream_count();
    report.stream_channels = transport.stream_channel_count();
    report.max_concurrent_streams = transport.max_concurrent_streams();
    report.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    report.cancelled = cancel.is_cancelled();
    report
}

async fn subscribe<C>(
    transport: &TopicTransport<C>,
    watermarks: &Watermarks,
    hold: Duration,
    tick: Duration,
    cancel: &CancellationToken,
) -> Outcome
where
    C: Send + Sync + 'static,
{
    let opened = transport
        .open_stream(|_connection| {
            let ticks = IntervalStream::new(tokio::time::interval(tick));
            async move { Ok(ticks) }
        })
        .await;

    let mut subscription = match opened {
        Ok(subscription) => subscription,
        Err(e) if e.is_resource_exhausted() => {
            telemetry::record(PoolEvent::Exhausted);
            return Outcome::Exhausted;
        }
        Err(e) => return Outcome::Failed(e.to_string()),
    };
    telemetry::record(PoolEvent::CheckedOut);
    watermarks.observe(transport);

    // Interval streams never end on their own.
    let deadline = tokio::time::sleep(hold);
    tokio::pin!(deadline);
    let mut items = 0;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = &mut deadline => break,
            next = TokioStreamExt::next(&mut subscription) => match next {
                Some(_) => items += 1,
                None => break,
            },
        }
    }
    drop(subscription);
    telemetry::record(PoolEvent::Released);

    Outcome::Admitted { items }
}
