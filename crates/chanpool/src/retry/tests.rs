use crate::retry::{
    ExponentialBackoffRetryStrategy, FixedCountRetryStrategy, FixedTimeoutRetryStrategy,
    NeverRetryStrategy, OperationClass, RetryProps, RetryStrategy, StatusCode, is_retryable,
    is_retryable_class,
};
use core::time::Duration;
use std::time::Instant;

#[test]
fn retry_table_fixtures() {
    assert!(is_retryable(StatusCode::Internal, "Get"));
    assert!(!is_retryable(StatusCode::Internal, "Increment"));
    assert!(!is_retryable(StatusCode::Unknown, "Get"));
    assert!(is_retryable(StatusCode::Unavailable, "Set"));
    assert!(!is_retryable(StatusCode::DeadlineExceeded, "Get"));
    assert!(is_retryable(StatusCode::Cancelled, "Get"));
}

#[test]
fn retry_table_is_exhaustively_consistent() {
    const TRANSIENT: [StatusCode; 3] = [
        StatusCode::Cancelled,
        StatusCode::Internal,
        StatusCode::Unavailable,
    ];

    for code in StatusCode::ALL {
        assert!(!is_retryable_class(code, OperationClass::NonIdempotent), "{code}");
        assert_eq!(
            is_retryable_class(code, OperationClass::Idempotent),
            TRANSIENT.contains(&code),
            "{code}"
        );
    }
}

#[test]
fn operations_classify_by_bare_or_full_name() {
    assert_eq!(OperationClass::of("Get"), OperationClass::Idempotent);
    assert_eq!(OperationClass::of("/cache_client.Scs/Get"), OperationClass::Idempotent);
    assert_eq!(
        OperationClass::of("/cache_client.pubsub.Pubsub/Subscribe"),
        OperationClass::Idempotent
    );
    assert_eq!(
        OperationClass::of("/cache_client.Scs/SortedSetLengthByScore"),
        OperationClass::Idempotent
    );

    for operation in [
        "Increment",
        "UpdateTtl",
        "/cache_client.Scs/UpdateTtl",
        "SetIf",
        "SetIfNotExists",
        "DictionaryIncrement",
        "SetPop",
        "ListPushFront",
        "ListPushBack",
        "ListPopFront",
        "ListPopBack",
        "ListConcatenateFront",
        "ListConcatenateBack",
        "ListRetain",
        "SortedSetIncrement",
    ] {
        assert_eq!(OperationClass::of(operation), OperationClass::NonIdempotent, "{operation}");
    }
}

#[test]
fn update_ttl_is_never_retried() {
    for code in StatusCode::ALL {
        assert!(!is_retryable(code, "/cache_client.Scs/UpdateTtl"), "{code}");
    }
}

#[test]
fn full_paths_only_match_their_own_service() {
    assert!(!is_retryable(StatusCode::Unavailable, "/other.Service/Get"));
    assert!(!is_retryable(StatusCode::Unavailable, "/cache_client.Scs/Subscribe"));
    assert!(!is_retryable(StatusCode::Unavailable, "/cache_client.pubsub.Pubsub/Get"));
    assert!(!is_retryable(StatusCode::Unavailable, "cache_client.Scs/Get"));
    assert!(is_retryable(StatusCode::Unavailable, "/cache_client.pubsub.Pubsub/Subscribe"));
}

#[test]
fn unknown_operations_are_not_retried() {
    assert_eq!(OperationClass::of("Frobnicate"), OperationClass::NonIdempotent);
    assert_eq!(OperationClass::of(""), OperationClass::NonIdempotent);
    assert!(!is_retryable(StatusCode::Unavailable, "/cache_client.Scs/Frobnicate"));
}

#[test]
fn status_codes_convert_from_wire_values() {
    for (value, code) in StatusCode::ALL.into_iter().enumerate() {
        assert_eq!(StatusCode::try_from(value as i32), Ok(code));
    }
    assert_eq!(StatusCode::try_from(17), Err(17));
    assert_eq!(StatusCode::try_from(-1), Err(-1));
    assert_eq!(StatusCode::Unavailable.to_string(), "UNAVAILABLE");
}

#[test]
fn fixed_count_retries_immediately_up_to_max_attempts() {
    let strategy = FixedCountRetryStrategy::default();
    assert_eq!(strategy.max_attempts(), 3);

    for attempt in 1..=3 {
        let props = RetryProps::new(StatusCode::Unavailable, "Get", attempt);
        assert_eq!(strategy.determine_when_to_retry(&props), Some(Duration::ZERO));
    }
    let props = RetryProps::new(StatusCode::Unavailable, "Get", 4);
    assert_eq!(strategy.determine_when_to_retry(&props), None);
}

#[test]
fn fixed_count_skips_ineligible_calls() {
    let strategy = FixedCountRetryStrategy::default();
    let props = RetryProps::new(StatusCode::Unavailable, "Increment", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), None);

    let props = RetryProps::new(StatusCode::DeadlineExceeded, "Get", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), None);
}

fn only_aborted(props: &RetryProps<'_>) -> bool {
    props.code == StatusCode::Aborted
}

#[test]
fn custom_eligibility_strategy_overrides_table() {
    let strategy = FixedCountRetryStrategy::default().with_eligibility_strategy(only_aborted);

    let props = RetryProps::new(StatusCode::Aborted, "Increment", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), Some(Duration::ZERO));

    let props = RetryProps::new(StatusCode::Unavailable, "Get", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), None);
}

#[test]
fn exponential_base_delay_grows_and_caps() {
    let strategy = ExponentialBackoffRetryStrategy::default();
    assert_eq!(strategy.base_delay(1), Duration::from_micros(500));
    assert_eq!(strategy.base_delay(2), Duration::from_millis(1));
    assert_eq!(strategy.base_delay(3), Duration::from_millis(2));
    assert_eq!(strategy.base_delay(5), Duration::from_millis(8));
    assert_eq!(strategy.base_delay(6), Duration::from_millis(8));
    assert_eq!(strategy.base_delay(u32::MAX), Duration::from_millis(8));
}

#[test]
fn exponential_delay_is_jittered_within_range() {
    let strategy = ExponentialBackoffRetryStrategy::default();

    for attempt in 1..=8 {
        let base = strategy.base_delay(attempt);
        let ceiling = base * 3 / 2;
        for _ in 0..200 {
            let props = RetryProps::new(StatusCode::Internal, "/cache_client.Scs/Get", attempt);
            let delay = strategy.determine_when_to_retry(&props).unwrap();
            assert!(delay >= base && delay < ceiling, "attempt {attempt}: {delay:?}");
        }
    }
}

#[test]
fn exponential_growth_factor_one_is_constant() {
    let strategy = ExponentialBackoffRetryStrategy::default()
        .with_growth_factor(1)
        .with_initial_delay(Duration::from_millis(3));

    let props = RetryProps::new(StatusCode::Unavailable, "Set", 4);
    let delay = strategy.determine_when_to_retry(&props).unwrap();
    assert!(delay >= Duration::from_millis(3) && delay < Duration::from_millis(9));
}

#[test]
fn exponential_never_retries_ineligible_calls() {
    let strategy = ExponentialBackoffRetryStrategy::default();
    let props = RetryProps::new(StatusCode::Unknown, "Get", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), None);

    let props = RetryProps::new(StatusCode::Internal, "SortedSetIncrement", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), None);
}

#[test]
fn never_retry_declines_everything() {
    let strategy = NeverRetryStrategy;
    for code in StatusCode::ALL {
        let props = RetryProps::new(code, "/cache_client.Scs/Get", 1);
        assert_eq!(strategy.determine_when_to_retry(&props), None, "{code}");
    }
    assert_eq!(strategy.calculate_retry_deadline(Instant::now()), None);
}

fn assert_jittered_around(delay: Duration, interval: Duration) {
    assert!(
        delay >= interval.mul_f64(0.9) && delay <= interval.mul_f64(1.1),
        "{delay:?} outside jitter range of {interval:?}"
    );
}

#[test]
fn fixed_timeout_retries_eligible_calls_after_jittered_interval() {
    let strategy = FixedTimeoutRetryStrategy::default();
    assert_eq!(strategy.retry_timeout(), Duration::from_millis(1000));
    assert_eq!(strategy.retry_delay_interval(), Duration::from_millis(100));

    for attempt in [1, 5, 50] {
        let props = RetryProps::new(StatusCode::Unavailable, "/cache_client.Scs/Get", attempt);
        let delay = strategy.determine_when_to_retry(&props).unwrap();
        assert_jittered_around(delay, Duration::from_millis(100));
    }

    let props = RetryProps::new(StatusCode::Unavailable, "Increment", 1);
    assert_eq!(strategy.determine_when_to_retry(&props), None);
}

#[test]
fn fixed_timeout_retries_attempt_timeouts_until_overall_deadline() {
    let strategy =
        FixedTimeoutRetryStrategy::default().with_retry_delay_interval(Duration::from_millis(20));

    // DEADLINE_EXCEEDED is never eligible by itself.
    let props = RetryProps::new(StatusCode::DeadlineExceeded, "Increment", 2);
    assert_eq!(strategy.determine_when_to_retry(&props), None);

    let later = Instant::now() + Duration::from_secs(60);
    let delay = strategy
        .determine_when_to_retry(&props.with_overall_deadline(later))
        .unwrap();
    assert_jittered_around(delay, Duration::from_millis(20));

    let passed = Instant::now() - Duration::from_millis(1);
    assert_eq!(
        strategy.determine_when_to_retry(&props.with_overall_deadline(passed)),
        None
    );
}

#[test]
fn fixed_timeout_clips_attempt_deadline_to_overall_deadline() {
    let strategy = FixedTimeoutRetryStrategy::default();

    let soon = Instant::now() + Duration::from_millis(10);
    assert_eq!(strategy.calculate_retry_deadline(soon), Some(soon));

    let before = Instant::now();
    let distant = before + Duration::from_secs(60);
    let deadline = strategy.calculate_retry_deadline(distant).unwrap();
    assert!(deadline >= before + Duration::from_millis(1000));
    assert!(deadline < distant);
}
