//! Quantile math for on-demand progress reporting.
//!
//! A VOD is split into N equal-length quantiles, where N depends on the
//! duration. Crossing into a new quantile triggers a watched-time report.
//! Playback position is reported separately on a fixed 0-128 scale.

/// Upper bound of the progress-watched scale.
pub const MAX_PROGRESS_UNITS: i32 = 128;

/// Number of quantiles for a VOD of the given duration in seconds.
pub fn quantile_count(duration: f64) -> u32 {
    if duration < 30.0 {
        1
    } else if duration < 60.0 {
        4
    } else if duration < 180.0 {
        8
    } else if duration < 300.0 {
        16
    } else {
        32
    }
}

/// Playback position on the 0-128 scale.
///
/// Returns 0 for a non-positive duration and clamps positions outside
/// the stream.
pub fn progress_units(progress: f64, duration: f64) -> i32 {
    if duration <= 0.0 {
        return 0;
    }
    let units = (f64::from(MAX_PROGRESS_UNITS) * (progress / duration)).floor();
    (units as i32).clamp(0, MAX_PROGRESS_UNITS)
}

/// Index of the quantile containing `progress`.
///
/// Returns 0 when the duration or quantile count is not positive.
pub fn quantile_index(progress: f64, duration: f64, count: u32) -> i64 {
    if duration <= 0.0 || count == 0 {
        return 0;
    }
    (progress / (duration / f64::from(count))).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_count_boundaries() {
        assert_eq!(quantile_count(1.0), 1);
        assert_eq!(quantile_count(29.0), 1);
        assert_eq!(quantile_count(29.9), 1);
        assert_eq!(quantile_count(30.0), 4);
        assert_eq!(quantile_count(59.0), 4);
        assert_eq!(quantile_count(60.0), 8);
        assert_eq!(quantile_count(179.0), 8);
        assert_eq!(quantile_count(180.0), 16);
        assert_eq!(quantile_count(299.0), 16);
        assert_eq!(quantile_count(300.0), 32);
        assert_eq!(quantile_count(7200.0), 32);
    }

    #[test]
    fn test_progress_units_range() {
        assert_eq!(progress_units(0.0, 40.0), 0);
        assert_eq!(progress_units(10.0, 40.0), 32);
        assert_eq!(progress_units(39.9, 40.0), 127);
        assert_eq!(progress_units(40.0, 40.0), MAX_PROGRESS_UNITS);

        for step in 0..=100 {
            let units = progress_units(f64::from(step) * 1.37, 137.0);
            assert!((0..=MAX_PROGRESS_UNITS).contains(&units));
        }
    }

    #[test]
    fn test_progress_units_guards() {
        assert_eq!(progress_units(10.0, 0.0), 0);
        assert_eq!(progress_units(50.0, 40.0), MAX_PROGRESS_UNITS);
        assert_eq!(progress_units(-5.0, 40.0), 0);
    }

    #[test]
    fn test_quantile_index() {
        assert_eq!(quantile_index(0.0, 40.0, 4), 0);
        assert_eq!(quantile_index(9.99, 40.0, 4), 0);
        assert_eq!(quantile_index(10.0, 40.0, 4), 1);
        assert_eq!(quantile_index(39.0, 40.0, 4), 3);
        assert_eq!(quantile_index(5.0, 100.0, 8), 0);
        assert_eq!(quantile_index(5.0, 0.0, 8), 0);
        assert_eq!(quantile_index(5.0, 100.0, 0), 0);
    }
}
