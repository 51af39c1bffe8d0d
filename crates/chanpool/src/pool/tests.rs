use crate::{
    error::{Error, Result},
    pool::{ChannelPool, DynamicChannelPool, StaticChannelPool, UnaryChannelPool},
};
use std::collections::HashSet;
use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::scope;

const CHANNELS: usize = 3;
const STREAMS_PER_CHANNEL: usize = 4;
const CAPACITY: usize = CHANNELS * STREAMS_PER_CHANNEL;

fn unit_factory() -> Result<()> {
    Ok(())
}

fn static_pool() -> StaticChannelPool<()> {
    StaticChannelPool::with_streams_per_channel(&unit_factory, CHANNELS, STREAMS_PER_CHANNEL)
        .unwrap()
}

/// A dynamic pool whose full-grown capacity equals [`CAPACITY`], pre-grown so
/// it behaves like the static pool.
fn grown_dynamic_pool() -> DynamicChannelPool<fn() -> Result<()>> {
    let pool = DynamicChannelPool::with_streams_per_channel(
        unit_factory as fn() -> Result<()>,
        CAPACITY,
        STREAMS_PER_CHANNEL,
    )
    .unwrap();
    let leases: Vec<_> = (0..CAPACITY).map(|_| pool.checkout().unwrap()).collect();
    drop(leases);
    assert_eq!(pool.channel_count(), CHANNELS);
    pool
}

fn run_exhausts_after_capacity<P: ChannelPool>(pool: P) {
    let leases: Vec<_> = (0..CAPACITY).map(|_| pool.checkout().unwrap()).collect();
    assert_eq!(pool.active_stream_count(), CAPACITY);

    let err = pool.checkout().unwrap_err();
    assert!(err.is_resource_exhausted());
    assert_eq!(
        err,
        Error::ResourceExhausted {
            max_concurrent_streams: CAPACITY,
            channels: CHANNELS,
        }
    );
    assert_eq!(pool.active_stream_count(), CAPACITY);

    drop(leases);
    assert_eq!(pool.active_stream_count(), 0);
    assert!(pool.checkout().is_ok());
}

fn run_checkout_release_round_trip<P: ChannelPool>(pool: P) {
    let _held = pool.checkout().unwrap();
    let active = pool.active_stream_count();
    let channels = pool.channel_count();

    let lease = pool.checkout().unwrap();
    assert_eq!(pool.active_stream_count(), active + 1);
    pool.release(lease).unwrap();

    assert_eq!(pool.active_stream_count(), active);
    assert_eq!(pool.channel_count(), channels);
}

fn run_burst_admits_exactly_capacity<P: ChannelPool>(pool: P) {
    const EXTRA: usize = 5;

    let barrier = Barrier::new(CAPACITY + EXTRA);
    let exhausted = AtomicUsize::new(0);

    let leases: Vec<_> = scope(|s| {
        let handles: Vec<_> = (0..CAPACITY + EXTRA)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    match pool.checkout() {
                        Ok(lease) => Some(lease),
                        Err(e) => {
                            assert!(e.is_resource_exhausted(), "unexpected error: {e}");
                            exhausted.fetch_add(1, Ordering::Relaxed);
                            None
                        }
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(leases.len(), CAPACITY);
    assert_eq!(exhausted.load(Ordering::Relaxed), EXTRA);
    assert_eq!(pool.active_stream_count(), CAPACITY);
}

fn run_capacity_invariant_under_churn<P: ChannelPool>(pool: P) {
    const THREADS: usize = 8;
    const ITERATIONS: usize = 2_000;

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut held = Vec::new();
                for i in 0..ITERATIONS {
                    match pool.checkout() {
                        Ok(lease) => held.push(lease),
                        Err(e) => assert!(e.is_resource_exhausted(), "unexpected error: {e}"),
                    }
                    assert!(pool.active_stream_count() <= pool.max_concurrent_streams());
                    if i % 3 == 0 {
                        held.clear();
                    } else if let Some(lease) = held.pop() {
                        pool.release(lease).unwrap();
                    }
                }
            });
        }
    });

    assert_eq!(pool.active_stream_count(), 0);
}

fn run_foreign_lease_is_rejected<P: ChannelPool>(pool: P, other: P) {
    let lease = pool.checkout().unwrap();
    let err = other.release(lease).unwrap_err();

    assert!(err.is_misuse());
    assert_eq!(
        err,
        Error::ForeignLease {
            lease_pool: pool.id(),
            pool: other.id(),
        }
    );
    // The rejected lease still went back to its own channel.
    assert_eq!(pool.active_stream_count(), 0);
    assert_eq!(other.active_stream_count(), 0);
}

fn run_closed_pool_rejects_checkout<P: ChannelPool>(pool: P) {
    let lease = pool.checkout().unwrap();
    pool.close();
    assert_eq!(pool.checkout().unwrap_err(), Error::PoolClosed);
    assert_eq!(pool.channel_count(), 0);
    assert_eq!(pool.max_concurrent_streams(), 0);
    drop(lease);

    // Closing twice is harmless.
    pool.close();
}

fn run_lease_released_on_panic<P: ChannelPool>(pool: P) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _lease = pool.checkout().unwrap();
        panic!("stream handler failed");
    }));
    assert!(result.is_err());
    assert_eq!(pool.active_stream_count(), 0);
}

#[test]
fn static_pool_exhausts_after_capacity() {
    run_exhausts_after_capacity(static_pool());
}

#[test]
fn dynamic_pool_exhausts_after_capacity() {
    run_exhausts_after_capacity(grown_dynamic_pool());
}

#[test]
fn static_pool_round_trip() {
    run_checkout_release_round_trip(static_pool());
}

#[test]
fn dynamic_pool_round_trip() {
    run_checkout_release_round_trip(grown_dynamic_pool());
}

#[test]
fn static_pool_burst() {
    run_burst_admits_exactly_capacity(static_pool());
}

#[test]
fn dynamic_pool_burst() {
    let pool = DynamicChannelPool::with_streams_per_channel(
        unit_factory as fn() -> Result<()>,
        CAPACITY,
        STREAMS_PER_CHANNEL,
    )
    .unwrap();
    run_burst_admits_exactly_capacity(pool);
}

#[test]
fn static_pool_capacity_invariant() {
    run_capacity_invariant_under_churn(static_pool());
}

#[test]
fn dynamic_pool_capacity_invariant() {
    let pool = DynamicChannelPool::with_streams_per_channel(
        unit_factory as fn() -> Result<()>,
        CAPACITY,
        STREAMS_PER_CHANNEL,
    )
    .unwrap();
    run_capacity_invariant_under_churn(pool);
}

#[test]
fn static_pool_foreign_lease() {
    run_foreign_lease_is_rejected(static_pool(), static_pool());
}

#[test]
fn dynamic_pool_foreign_lease() {
    run_foreign_lease_is_rejected(grown_dynamic_pool(), grown_dynamic_pool());
}

#[test]
fn static_pool_close() {
    run_closed_pool_rejects_checkout(static_pool());
}

#[test]
fn dynamic_pool_close() {
    run_closed_pool_rejects_checkout(grown_dynamic_pool());
}

#[test]
fn static_pool_panic_releases_lease() {
    run_lease_released_on_panic(static_pool());
}

#[test]
fn dynamic_pool_panic_releases_lease() {
    run_lease_released_on_panic(grown_dynamic_pool());
}

#[test]
fn static_pool_rotates_starting_channel() {
    let pool = static_pool();
    let leases: Vec<_> = (0..CHANNELS).map(|_| pool.checkout().unwrap()).collect();
    let channels: HashSet<_> = leases.iter().map(|lease| lease.channel_id()).collect();
    assert_eq!(channels.len(), CHANNELS);
}

#[test]
fn static_pool_rejects_zero_channels() {
    let err = StaticChannelPool::new(&unit_factory, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn static_pool_propagates_factory_error() {
    let factory = || -> Result<()> { Err(Error::connection("refused")) };
    let err = StaticChannelPool::new(&factory, 2).unwrap_err();
    assert_eq!(err, Error::connection("refused"));
}

#[test]
fn dynamic_pool_starts_with_one_channel() {
    let created = AtomicUsize::new(0);
    let pool = DynamicChannelPool::new(
        || {
            created.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Error>(())
        },
        400,
    )
    .unwrap();

    assert_eq!(created.load(Ordering::Relaxed), 1);
    assert_eq!(pool.channel_count(), 1);
    assert_eq!(pool.max_channels(), 4);
    assert_eq!(pool.max_concurrent_streams(), 100);
}

#[test]
fn dynamic_pool_grows_one_channel_at_a_time() {
    let created = AtomicUsize::new(0);
    let pool = DynamicChannelPool::with_streams_per_channel(
        || {
            created.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Error>(())
        },
        CAPACITY,
        STREAMS_PER_CHANNEL,
    )
    .unwrap();

    let mut leases = Vec::new();
    for expected_channels in 1..=CHANNELS {
        for _ in 0..STREAMS_PER_CHANNEL {
            leases.push(pool.checkout().unwrap());
            assert_eq!(pool.channel_count(), expected_channels);
        }
    }
    assert!(pool.checkout().unwrap_err().is_resource_exhausted());
    assert_eq!(created.load(Ordering::Relaxed), CHANNELS);
}

#[test]
fn dynamic_pool_concurrent_growth_does_not_overshoot() {
    const THREADS: usize = 10;
    const CHECKOUTS_PER_THREAD: usize = 15;

    let created = AtomicUsize::new(0);
    let pool = DynamicChannelPool::new(
        || {
            created.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Error>(())
        },
        400,
    )
    .unwrap();
    let barrier = Barrier::new(THREADS);

    let leases: Vec<_> = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    (0..CHECKOUTS_PER_THREAD)
                        .map(|_| pool.checkout().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(leases.len(), THREADS * CHECKOUTS_PER_THREAD);
    assert_eq!(pool.active_stream_count(), 150);
    assert_eq!(pool.channel_count(), 2);
    assert_eq!(created.load(Ordering::Relaxed), 2);
}

#[test]
fn dynamic_pool_never_exceeds_ceiling_under_contention() {
    const THREADS: usize = 8;

    let created = AtomicUsize::new(0);
    // 250 streams at 100 per channel round up to 3 channels.
    let pool = DynamicChannelPool::new(
        || {
            created.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Error>(())
        },
        250,
    )
    .unwrap();
    let barrier = Barrier::new(THREADS);
    let exhausted = AtomicUsize::new(0);

    let granted: usize = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let mut held = Vec::new();
                    for _ in 0..100 {
                        match pool.checkout() {
                            Ok(lease) => held.push(lease),
                            Err(_) => {
                                exhausted.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                    held
                })
            })
            .collect();
        let held: Vec<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        held.len()
    });

    assert_eq!(granted, 300);
    assert_eq!(exhausted.load(Ordering::Relaxed), THREADS * 100 - 300);
    assert_eq!(pool.channel_count(), 3);
    assert_eq!(created.load(Ordering::Relaxed), 3);
}

#[test]
fn dynamic_pool_never_shrinks() {
    let pool = DynamicChannelPool::with_streams_per_channel(
        unit_factory as fn() -> Result<()>,
        CAPACITY,
        STREAMS_PER_CHANNEL,
    )
    .unwrap();
    let leases: Vec<_> = (0..CAPACITY).map(|_| pool.checkout().unwrap()).collect();
    assert_eq!(pool.channel_count(), CHANNELS);

    for lease in leases {
        pool.release(lease).unwrap();
    }
    assert_eq!(pool.active_stream_count(), 0);
    assert_eq!(pool.channel_count(), CHANNELS);
    assert_eq!(pool.max_concurrent_streams(), CAPACITY);
}

#[test]
fn dynamic_pool_growth_failure_keeps_pool_usable() {
    let attempts = AtomicUsize::new(0);
    let pool = DynamicChannelPool::with_streams_per_channel(
        || {
            if attempts.fetch_add(1, Ordering::Relaxed) == 0 {
                Ok(())
            } else {
                Err(Error::connection("endpoint unreachable"))
            }
        },
        CAPACITY,
        STREAMS_PER_CHANNEL,
    )
    .unwrap();

    let leases: Vec<_> = (0..STREAMS_PER_CHANNEL)
        .map(|_| pool.checkout().unwrap())
        .collect();
    assert_eq!(
        pool.checkout().unwrap_err(),
        Error::connection("endpoint unreachable")
    );
    assert_eq!(pool.channel_count(), 1);
    assert_eq!(pool.active_stream_count(), STREAMS_PER_CHANNEL);

    drop(leases);
    assert!(pool.checkout().is_ok());
}

#[test]
fn dynamic_pool_rejects_zero_ceiling() {
    let err = DynamicChannelPool::new(unit_factory as fn() -> Result<()>, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn unary_pool_round_robin_and_close() {
    let next_id = AtomicUsize::new(0);
    let pool = UnaryChannelPool::new(
        &|| Ok::<_, Error>(next_id.fetch_add(1, Ordering::Relaxed)),
        3,
    )
    .unwrap();

    let picked: Vec<_> = (0..6).map(|_| *pool.next().unwrap()).collect();
    assert_eq!(picked, [0, 1, 2, 0, 1, 2]);

    let in_flight = pool.next().unwrap();
    pool.close();
    assert!(pool.is_empty());
    assert_eq!(pool.next().unwrap_err(), Error::PoolClosed);
    assert_eq!(*in_flight, 0);
}

#[test]
fn unary_pool_rejects_zero_channels() {
    let err = UnaryChannelPool::new(&unit_factory, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[test]
fn static_pool_reports_low_capacity() {
    let pool = StaticChannelPool::new(&unit_factory, 2).unwrap();
    let mut leases: Vec<_> = (0..190).map(|_| pool.checkout().unwrap()).collect();
    assert_eq!(pool.low_capacity_remaining(), None);

    leases.push(pool.checkout().unwrap());
    assert_eq!(pool.low_capacity_remaining(), Some(9));

    leases.extend((0..9).map(|_| pool.checkout().unwrap()));
    assert_eq!(pool.low_capacity_remaining(), Some(0));
}

#[test]
fn dynamic_pool_reports_low_capacity_only_at_ceiling() {
    let pool = DynamicChannelPool::new(unit_factory, 200).unwrap();

    // One channel nearly full, but the pool can still grow.
    let mut leases: Vec<_> = (0..95).map(|_| pool.checkout().unwrap()).collect();
    assert_eq!(pool.channel_count(), 1);
    assert_eq!(pool.low_capacity_remaining(), None);

    leases.extend((0..55).map(|_| pool.checkout().unwrap()));
    assert_eq!(pool.channel_count(), 2);
    assert_eq!(pool.low_capacity_remaining(), None);

    leases.extend((0..45).map(|_| pool.checkout().unwrap()));
    assert_eq!(pool.low_capacity_remaining(), Some(5));

    leases.truncate(150);
    assert_eq!(pool.low_capacity_remaining(), None);
}
