use std::time::{Duration, SystemTime};

/// Returns the current unix timestamp (seconds elapsed since 1970-01-01).
#[inline]
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// The original platform passed fractional seconds to an integer-only `sleep()`, silently
/// truncating short backoffs to zero. Every such delay in this workspace is expressed as an
/// explicit, named millisecond duration instead.
#[inline]
pub const fn millis(n: u64) -> Duration {
    Duration::from_millis(n)
}
