use core::fmt;
use std::time::Instant;

/// gRPC status codes, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl StatusCode {
    /// Every status code in wire order.
    pub const ALL: [Self; 17] = [
        Self::Ok,
        Self::Cancelled,
        Self::Unknown,
        Self::InvalidArgument,
        Self::DeadlineExceeded,
        Self::NotFound,
        Self::AlreadyExists,
        Self::PermissionDenied,
        Self::ResourceExhausted,
        Self::FailedPrecondition,
        Self::Aborted,
        Self::OutOfRange,
        Self::Unimplemented,
        Self::Internal,
        Self::Unavailable,
        Self::DataLoss,
        Self::Unauthenticated,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = i32;

    /// Returns the unrecognized value as the error.
    fn try_from(value: i32) -> Result<Self, i32> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether repeating an operation can change its outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationClass {
    /// Repeating the call leaves the service in the same state.
    Idempotent = 0,
    /// Repeating the call may apply its side effect twice.
    NonIdempotent = 1,
}

impl OperationClass {
    /// Classifies an operation by its gRPC method name.
    ///
    /// Accepts either the bare method name (`"Get"`) or the full request path
    /// (`"/cache_client.Scs/Get"`). A full path only matches methods of the
    /// service it names. Operations not known to be idempotent, including any
    /// method of an unknown service, are [`OperationClass::NonIdempotent`].
    pub fn of(operation: &str) -> Self {
        let idempotent = match operation.rsplit_once('/') {
            None => {
                IDEMPOTENT_CACHE_OPERATIONS.contains(&operation)
                    || IDEMPOTENT_PUBSUB_OPERATIONS.contains(&operation)
            }
            Some((CACHE_SERVICE, method)) => IDEMPOTENT_CACHE_OPERATIONS.contains(&method),
            Some((PUBSUB_SERVICE, method)) => IDEMPOTENT_PUBSUB_OPERATIONS.contains(&method),
            Some(_) => false,
        };
        if idempotent {
            Self::Idempotent
        } else {
            Self::NonIdempotent
        }
    }
}

const CACHE_SERVICE: &str = "/cache_client.Scs";
const PUBSUB_SERVICE: &str = "/cache_client.pubsub.Pubsub";

/// Cache methods that may be resubmitted safely.
///
/// Increment, UpdateTtl, SetIf, SetIfNotExists, SetPop, SortedSetIncrement
/// and the list push, pop, concatenate and retain methods are absent.
const IDEMPOTENT_CACHE_OPERATIONS: &[&str] = &[
    "Get",
    "GetBatch",
    "Set",
    "SetBatch",
    "Delete",
    "KeysExist",
    "ItemGetTtl",
    "ItemGetType",
    "DictionaryGet",
    "DictionaryFetch",
    "DictionarySet",
    "DictionaryDelete",
    "DictionaryLength",
    "SetFetch",
    "SetSample",
    "SetUnion",
    "SetDifference",
    "SetContains",
    "SetLength",
    // Idempotent while it removes every occurrence of a value.
    "ListRemove",
    "ListFetch",
    "ListLength",
    "SortedSetPut",
    "SortedSetFetch",
    "SortedSetGetScore",
    "SortedSetRemove",
    "SortedSetGetRank",
    "SortedSetLength",
    "SortedSetLengthByScore",
];

const IDEMPOTENT_PUBSUB_OPERATIONS: &[&str] = &["Subscribe"];

/// Retry policy indexed by `[status code][operation class]`.
///
/// Only transient failures (`CANCELLED`, `INTERNAL`, `UNAVAILABLE`) of
/// idempotent operations are retryable. `DEADLINE_EXCEEDED` already consumed
/// the caller's budget and `UNKNOWN` leaves the server state ambiguous.
const RETRY_POLICY: [[bool; 2]; 17] = {
    let mut table = [[false; 2]; 17];
    table[StatusCode::Cancelled as usize][OperationClass::Idempotent as usize] = true;
    table[StatusCode::Internal as usize][OperationClass::Idempotent as usize] = true;
    table[StatusCode::Unavailable as usize][OperationClass::Idempotent as usize] = true;
    table
};

/// Returns whether a call to `operation` that failed with `code` may be
/// resubmitted.
///
/// # Example
/// ```
/// use chanpool::{StatusCode, is_retryable};
///
/// assert!(is_retryable(StatusCode::Unavailable, "/cache_client.Scs/Set"));
/// assert!(!is_retryable(StatusCode::Internal, "Increment"));
/// assert!(!is_retryable(StatusCode::DeadlineExceeded, "Get"));
/// ```
pub fn is_retryable(code: StatusCode, operation: &str) -> bool {
    is_retryable_class(code, OperationClass::of(operation))
}

/// The policy table lookup behind [`is_retryable`].
pub const fn is_retryable_class(code: StatusCode, class: OperationClass) -> bool {
    RETRY_POLICY[code as usize][class as usize]
}

/// What a retry strategy knows about a failed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryProps<'a> {
    pub code: StatusCode,
    /// The gRPC method, bare or as a full request path.
    pub operation: &'a str,
    /// 1 for the first retry decision of a logical call.
    pub attempt_number: u32,
    /// When the logical call as a whole times out. Only consulted by
    /// [`FixedTimeoutRetryStrategy`](crate::FixedTimeoutRetryStrategy).
    pub overall_deadline: Option<Instant>,
}

impl<'a> RetryProps<'a> {
    pub const fn new(code: StatusCode, operation: &'a str, attempt_number: u32) -> Self {
        Self {
            code,
            operation,
            attempt_number,
            overall_deadline: None,
        }
    }

    #[must_use]
    pub const fn with_overall_deadline(self, deadline: Instant) -> Self {
        Self {
            overall_deadline: Some(deadline),
            ..self
        }
    }
}

/// Decides whether a failed call is eligible for retry at all, regardless of
/// how many attempts have been made.
pub trait EligibilityStrategy: Send + Sync {
    fn is_eligible_for_retry(&self, props: &RetryProps<'_>) -> bool;
}

/// Eligibility from the built-in policy table, see [`is_retryable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEligibilityStrategy;

impl EligibilityStrategy for DefaultEligibilityStrategy {
    fn is_eligible_for_retry(&self, props: &RetryProps<'_>) -> bool {
        is_retryable(props.code, props.operation)
    }
}

impl<F> EligibilityStrategy for F
where
    F: Fn(&RetryProps<'_>) -> bool + Send + Sync,
{
    fn is_eligible_for_retry(&self, props: &RetryProps<'_>) -> bool {
        self(props)
    }
}
