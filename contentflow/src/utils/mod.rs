//! Utility functions for run ids and timestamp handling.

pub mod timestamps;

pub use timestamps::{iso_timestamp, now_utc, seconds_between, Timestamp};

use uuid::Uuid;

/// Generates a fresh production run id.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}
