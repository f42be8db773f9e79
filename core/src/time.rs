//! Time related utils.

use chrono::Utc;

/// DateTime in UTC.
pub type DateTime = chrono::DateTime<Utc>;

/// Take the current time.
pub fn now() -> DateTime {
    Utc::now()
}

/// Seconds since the unix epoch for the given time.
///
/// Signatures embed this value; it is captured once per call attempt.
pub fn unix_seconds(t: DateTime) -> i64 {
    t.timestamp()
}
