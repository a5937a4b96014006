/*!
 * Tests for time expression parsing
 */

use subclip::errors::TimeSpecError;
use subclip::time_spec::{TimeRange, format_seconds, parse_time_spec};

/// Test the documented examples
#[test]
fn test_parse_time_spec_withDocumentedExamples_shouldMatch() {
    assert_eq!(parse_time_spec("01:02:03").unwrap(), 3723.0);
    assert_eq!(parse_time_spec("45").unwrap(), 45.0);
    assert!(matches!(parse_time_spec("bad:x"), Err(TimeSpecError::InvalidTimeSpec(_))));
}

/// Clock parts are summed even when out of their usual range
#[test]
fn test_parse_time_spec_withOverflowingParts_shouldStillSum() {
    assert_eq!(parse_time_spec("0:90:00").unwrap(), 5400.0);
    assert_eq!(parse_time_spec("00:00:75").unwrap(), 75.0);
}

/// Malformed clock expressions
#[test]
fn test_parse_time_spec_withWrongPartCount_shouldFail() {
    for spec in ["1:2", "1:2:3:4", "", "  ", "-5", "1:-2:3", "inf", "NaN", "1.5:00:00"] {
        assert!(parse_time_spec(spec).is_err(), "'{}' should be rejected", spec);
    }
}

/// Fractional seconds are allowed in the plain form
#[test]
fn test_parse_time_spec_withFraction_shouldKeepIt() {
    assert_eq!(parse_time_spec("12.25").unwrap(), 12.25);
    assert_eq!(parse_time_spec(" 7 ").unwrap(), 7.0);
}

/// A range is only valid when end is after start
#[test]
fn test_time_range_withEqualEnds_shouldFailFast() {
    let result = TimeRange::parse("00:01:00", "60");
    assert!(matches!(result, Err(TimeSpecError::InvalidRange { .. })));
}

/// A range reports its duration and millisecond bounds
#[test]
fn test_time_range_withMixedForms_shouldExposeBounds() {
    let range = TimeRange::parse("00:00:05", "7.5").unwrap();

    assert_eq!(range.start(), 5.0);
    assert_eq!(range.end(), 7.5);
    assert_eq!(range.duration(), 2.5);
    assert_eq!(range.start_ms(), 5_000);
    assert_eq!(range.end_ms(), 7_500);
}

/// Seconds are formatted back into clock form with milliseconds
#[test]
fn test_format_seconds_withHours_shouldRoundTripDocumentedExample() {
    assert_eq!(format_seconds(3723.0), "01:02:03.000");
}
