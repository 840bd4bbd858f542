/// Typed errors for stream validation.
///
/// The clustering and scoring paths never fail; these exist for callers that
/// want to reject malformed input before analysis.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("event {index} at {timestamp_ms}ms precedes the previous event at {previous_ms}ms")]
    OutOfOrder {
        index:        usize,
        timestamp_ms: u64,
        previous_ms:  u64,
    },
}
