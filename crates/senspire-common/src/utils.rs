// Time helpers shared by ingestion and queries

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{Result, SenspireError};

/// Current server time
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate a timestamp down to the start of its resolution bucket.
///
/// Buckets are aligned to the UNIX epoch, so negative timestamps round toward
/// negative infinity. A zero resolution returns the timestamp unchanged.
pub fn truncate_to_resolution(ts: DateTime<Utc>, resolution: Duration) -> DateTime<Utc> {
    let step = resolution.as_micros() as i64;
    if step <= 0 {
        return ts;
    }
    let micros = ts.timestamp_micros();
    micros
        .div_euclid(step)
        .checked_mul(step)
        .and_then(DateTime::from_timestamp_micros)
        .unwrap_or(ts)
}

/// Half-open bucket `[start, start + resolution)` containing `ts`.
///
/// Fails with `IllegalArgument` when the bucket end is not a representable
/// timestamp.
pub fn resolution_bucket(
    ts: DateTime<Utc>,
    resolution: Duration,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = truncate_to_resolution(ts, resolution);
    let width = TimeDelta::from_std(resolution).map_err(|_| {
        SenspireError::IllegalArgument(format!("resolution {:?} is too large", resolution))
    })?;
    // Zero-width bucket degenerates to the single instant
    let width = if width.is_zero() {
        TimeDelta::microseconds(1)
    } else {
        width
    };
    let end = start.checked_add_signed(width).ok_or_else(|| {
        SenspireError::IllegalArgument(format!("timestamp {} has no representable bucket", ts))
    })?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_truncate_to_second() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_750).unwrap();
        let truncated = truncate_to_resolution(ts, Duration::from_secs(1));
        assert_eq!(truncated.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_truncate_negative_timestamp() {
        let ts = Utc.timestamp_millis_opt(-1_500).unwrap();
        let truncated = truncate_to_resolution(ts, Duration::from_secs(1));
        assert_eq!(truncated.timestamp_millis(), -2_000);
    }

    #[test]
    fn test_zero_resolution() {
        let ts = Utc.timestamp_millis_opt(1_234).unwrap();
        assert_eq!(truncate_to_resolution(ts, Duration::ZERO), ts);
        let (start, end) = resolution_bucket(ts, Duration::ZERO).unwrap();
        assert_eq!(start, ts);
        assert!(end > start);
    }

    #[test]
    fn test_resolution_bucket() {
        let ts = Utc.timestamp_millis_opt(10_250).unwrap();
        let (start, end) = resolution_bucket(ts, Duration::from_millis(500)).unwrap();
        assert_eq!(start.timestamp_millis(), 10_000);
        assert_eq!(end.timestamp_millis(), 10_500);
    }

    #[test]
    fn test_bucket_at_end_of_time() {
        let err = resolution_bucket(DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SenspireError::IllegalArgument(_)));
    }

    proptest! {
        #[test]
        fn prop_bucket_contains_timestamp(millis in -10_000_000_000i64..10_000_000_000i64, width in 1u64..3_600_000u64) {
            let ts = Utc.timestamp_millis_opt(millis).unwrap();
            let (start, end) = resolution_bucket(ts, Duration::from_millis(width)).unwrap();
            prop_assert!(start <= ts);
            prop_assert!(ts < end);
        }
    }
}
