//! Timestamp helpers shared by the tracker and the orchestrator.

use chrono::{DateTime, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// # Examples
///
/// ```
/// use contentflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Returns the elapsed seconds between two timestamps.
///
/// Negative spans (clock skew) are reported as zero.
#[must_use]
pub fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    let span = end.signed_duration_since(start);
    #[allow(clippy::cast_precision_loss)]
    let millis = span.num_milliseconds() as f64;
    (millis / 1000.0).max(0.0)
}
