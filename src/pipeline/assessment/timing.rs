use chrono::NaiveDate;

use crate::models::RadiationTiming;

/// Whole days from `start` to `end`; negative when `end` is earlier.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Place the follow-up scan relative to the post-radiation treatment window.
/// A negative day count means the dates are inconsistent and is unknown.
pub fn radiation_timing(days_since_radiation: Option<i64>, window_days: i64) -> (RadiationTiming, String) {
    match days_since_radiation {
        None => (
            RadiationTiming::Unknown,
            "Radiation date or follow-up date unknown".to_string(),
        ),
        Some(days) if days < 0 => (
            RadiationTiming::Unknown,
            format!("Follow-up precedes radiation completion by {} days", -days),
        ),
        Some(days) if days < window_days => (
            RadiationTiming::Within90Days,
            format!("{days} days since radiation (<{window_days} days)"),
        ),
        Some(days) => (
            RadiationTiming::Beyond90Days,
            format!("{days} days since radiation (≥{window_days} days)"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn counts_days() {
        assert_eq!(days_between(d(2024, 10, 15), d(2025, 1, 13)), 90);
        assert_eq!(days_between(d(2024, 10, 15), d(2024, 10, 1)), -14);
    }

    #[test]
    fn window_boundary() {
        assert_eq!(radiation_timing(Some(89), 90).0, RadiationTiming::Within90Days);
        assert_eq!(radiation_timing(Some(90), 90).0, RadiationTiming::Beyond90Days);
    }

    #[test]
    fn negative_or_missing_is_unknown() {
        assert_eq!(radiation_timing(Some(-3), 90).0, RadiationTiming::Unknown);
        assert_eq!(radiation_timing(None, 90).0, RadiationTiming::Unknown);
    }
}
