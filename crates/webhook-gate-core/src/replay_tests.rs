//! Tests for timestamp parsing and freshness checks.

use super::*;
use chrono::{Duration, SecondsFormat, TimeZone};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 8, 43, 40).unwrap()
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

mod freshness_policy_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = FreshnessPolicy::default();
        assert_eq!(policy.max_age_seconds, 300);
        assert_eq!(policy.max_future_skew_seconds, 30);
        assert!(policy.validate().is_ok());
    }

    /// Verify the inclusive bounds of both configurable ranges.
    #[test]
    fn test_accepts_range_edges() {
        assert!(FreshnessPolicy::new(60, 1).is_ok());
        assert!(FreshnessPolicy::new(3600, 300).is_ok());
    }

    #[test]
    fn test_rejects_values_outside_ranges() {
        for (age, skew) in [(59, 30), (3601, 30), (300, 0), (300, 301)] {
            let result = FreshnessPolicy::new(age, skew);
            assert!(
                matches!(result, Err(ValidationError::OutOfRange { .. })),
                "({}, {}) should be rejected, got {:?}",
                age,
                skew,
                result
            );
        }
    }

    #[test]
    fn test_deserialize_fills_missing_fields_with_defaults() {
        let policy: FreshnessPolicy = serde_json::from_str(r#"{"max_age_seconds":600}"#).unwrap();
        assert_eq!(policy.max_age_seconds, 600);
        assert_eq!(policy.max_future_skew_seconds, 30);
    }
}

mod window_tests {
    use super::*;

    /// Verify boundary-adjacent timestamps with the default policy.
    #[test]
    fn test_boundary_adjacent_timestamps() {
        let policy = FreshnessPolicy::default();
        let now = now();

        assert!(validate_timestamp(&rfc3339(now), now, &policy).is_ok());
        assert!(validate_timestamp(&rfc3339(now - Duration::seconds(299)), now, &policy).is_ok());
        assert!(validate_timestamp(&rfc3339(now + Duration::seconds(29)), now, &policy).is_ok());

        assert!(matches!(
            validate_timestamp(&rfc3339(now - Duration::seconds(301)), now, &policy),
            Err(TimestampError::TooOld { age_seconds: 301, max_age_seconds: 300 })
        ));
        assert!(matches!(
            validate_timestamp(&rfc3339(now + Duration::seconds(31)), now, &policy),
            Err(TimestampError::TooFarInFuture { skew_seconds: 31, max_future_skew_seconds: 30 })
        ));
    }

    #[test]
    fn test_exact_bounds_are_inclusive() {
        let policy = FreshnessPolicy::default();
        let now = now();
        assert!(validate_timestamp(&rfc3339(now - Duration::seconds(300)), now, &policy).is_ok());
        assert!(validate_timestamp(&rfc3339(now + Duration::seconds(30)), now, &policy).is_ok());
    }

    /// Verify that sub-second precision past the bound is rejected.
    #[test]
    fn test_millisecond_past_bound_is_rejected() {
        let policy = FreshnessPolicy::default();
        let now = now();
        let created = (now - Duration::milliseconds(300_001))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        assert!(matches!(
            validate_timestamp(&created, now, &policy),
            Err(TimestampError::TooOld { .. })
        ));
    }

    #[test]
    fn test_custom_policy_is_honoured() {
        let policy = FreshnessPolicy::new(60, 5).unwrap();
        let now = now();
        assert!(validate_timestamp(&rfc3339(now - Duration::seconds(61)), now, &policy).is_err());
        assert!(validate_timestamp(&rfc3339(now + Duration::seconds(6)), now, &policy).is_err());
        assert!(validate_timestamp(&rfc3339(now - Duration::seconds(59)), now, &policy).is_ok());
    }

    /// Verify that non-UTC offsets are normalised before comparison.
    #[test]
    fn test_offsets_are_normalised() {
        let policy = FreshnessPolicy::default();
        let now = now();
        let validated = validate_timestamp("2025-11-03T10:43:40+02:00", now, &policy).unwrap();
        assert_eq!(validated, now);

        let validated = validate_timestamp("2025-11-03T03:43:40-0500", now, &policy).unwrap();
        assert_eq!(validated, now);
    }
}

mod parse_tests {
    use super::*;

    #[test]
    fn test_naive_timestamps_are_rejected() {
        for raw in [
            "2025-11-03T08:43:40",
            "2025-11-03T08:43:40.123",
            "2025-11-03 08:43:40",
        ] {
            assert_eq!(
                parse_timestamp(raw),
                Err(TimestampError::MissingTimezone),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_non_iso_values_are_unparseable() {
        for raw in ["", "yesterday", "1730623420", "2025-11-03", "03/11/2025 08:43"] {
            let err = parse_timestamp(raw).unwrap_err();
            assert!(err.is_format_error(), "{:?} for {:?}", err, raw);
        }
    }

    #[test]
    fn test_kinds_are_distinct() {
        let kinds = [
            TimestampError::Unparseable {
                message: String::new(),
            }
            .kind(),
            TimestampError::MissingTimezone.kind(),
            TimestampError::TooOld {
                age_seconds: 0,
                max_age_seconds: 0,
            }
            .kind(),
            TimestampError::TooFarInFuture {
                skew_seconds: 0,
                max_future_skew_seconds: 0,
            }
            .kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
