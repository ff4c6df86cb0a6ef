use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// UTC timestamp used throughout ODS records.
///
/// Wire format is ISO-8601 at seconds precision without a zone suffix
/// (`2026-03-01T12:00:00`); all values are UTC. Parsing is deliberately
/// permissive about the inputs observers actually send: RFC 3339 with an
/// offset, naive date-times with or without fractional seconds, minute
/// precision, bare dates, and the named time `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OdsTime(DateTime<Utc>);

impl OdsTime {
    pub fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Current time, truncated to whole seconds to match the wire format.
    pub fn now() -> Self {
        let now = Utc::now();
        Self(now - TimeDelta::nanoseconds(i64::from(now.timestamp_subsec_nanos())))
    }

    /// Interpret a timestamp string.
    ///
    /// Accepted forms, tried in order:
    /// - the named time `now`
    /// - RFC 3339 (`2026-03-01T12:00:00Z`, `2026-03-01T12:00:00+00:00`)
    /// - naive ISO date-time, seconds or fractional seconds, `T` or space
    ///   separated (`2026-03-01T12:00:00`, `2026-03-01 12:00:00.5`)
    /// - minute precision (`2026-03-01T12:00`)
    /// - bare date (`2026-03-01`), meaning midnight UTC
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("now") {
            return Ok(Self::now());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        const NAIVE_FORMATS: [&str; 6] = [
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M",
        ];
        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
                return Ok(Self(naive.and_utc()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(naive.and_utc()));
            }
        }
        Err(format!("{value} is not a recognized UTC timestamp"))
    }

    /// Canonical wire form: ISO-8601, seconds precision, no zone suffix.
    pub fn to_iso_seconds(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn from_unix_timestamp(timestamp: i64) -> Self {
        Self(DateTime::from_timestamp(timestamp, 0).unwrap_or(DateTime::UNIX_EPOCH))
    }

    pub fn unix_timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// This time shifted by a whole number of seconds (negative moves back).
    pub fn offset_seconds(&self, seconds: i64) -> Self {
        Self(self.0 + TimeDelta::seconds(seconds))
    }

    /// Seconds from `self` to `other` (positive when `other` is later).
    pub fn seconds_until(&self, other: &OdsTime) -> i64 {
        (other.0 - self.0).num_seconds()
    }
}

impl From<DateTime<Utc>> for OdsTime {
    fn from(dt: DateTime<Utc>) -> Self {
        OdsTime::new(dt)
    }
}

impl std::fmt::Display for OdsTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso_seconds())
    }
}

impl Serialize for OdsTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_seconds())
    }
}

impl<'de> Deserialize<'de> for OdsTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OdsTime::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Build consecutive observation windows from a start time.
///
/// Each entry of `durations_sec` produces one `(start, stop)` window;
/// successive windows are separated by `gap_sec` so records stay disjoint.
pub fn generate_observation_times(
    start: OdsTime,
    durations_sec: &[i64],
    gap_sec: i64,
) -> Vec<(OdsTime, OdsTime)> {
    let mut windows = Vec::with_capacity(durations_sec.len());
    let mut current = start;
    for &duration in durations_sec {
        let stop = current.offset_seconds(duration);
        windows.push((current, stop));
        current = stop.offset_seconds(gap_sec);
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let t = OdsTime::parse("2026-03-01T12:00:00Z").unwrap();
        assert_eq!(t.to_iso_seconds(), "2026-03-01T12:00:00");
    }

    #[test]
    fn test_parse_rfc3339_offset() {
        let t = OdsTime::parse("2026-03-01T14:00:00+02:00").unwrap();
        assert_eq!(t.to_iso_seconds(), "2026-03-01T12:00:00");
    }

    #[test]
    fn test_parse_naive_seconds() {
        let t = OdsTime::parse("2026-03-01T12:00:00").unwrap();
        assert_eq!(t.to_iso_seconds(), "2026-03-01T12:00:00");
    }

    #[test]
    fn test_parse_naive_space_separator() {
        let t = OdsTime::parse("2026-03-01 12:00:00").unwrap();
        assert_eq!(t.to_iso_seconds(), "2026-03-01T12:00:00");
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let t = OdsTime::parse("2026-03-01T12:00:00.750").unwrap();
        // Fraction survives internally even though the wire form truncates.
        assert_eq!(t.to_datetime().timestamp_subsec_millis(), 750);
        assert_eq!(t.to_iso_seconds(), "2026-03-01T12:00:00");
    }

    #[test]
    fn test_parse_minute_precision() {
        let t = OdsTime::parse("2026-03-01T12:30").unwrap();
        assert_eq!(t.to_iso_seconds(), "2026-03-01T12:30:00");
    }

    #[test]
    fn test_parse_bare_date() {
        let t = OdsTime::parse("2026-03-01").unwrap();
        assert_eq!(t.to_iso_seconds(), "2026-03-01T00:00:00");
    }

    #[test]
    fn test_parse_now() {
        let before = OdsTime::now();
        let t = OdsTime::parse("now").unwrap();
        let after = OdsTime::now();
        assert!(before <= t && t <= after.offset_seconds(1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(OdsTime::parse("not a time").is_err());
        assert!(OdsTime::parse("2026-13-40T99:00:00").is_err());
        assert!(OdsTime::parse("").is_err());
    }

    #[test]
    fn test_ordering() {
        let t1 = OdsTime::parse("2026-03-01T00:00:00").unwrap();
        let t2 = OdsTime::parse("2026-03-01T00:00:01").unwrap();
        assert!(t1 < t2);
        assert!(t2 > t1);
    }

    #[test]
    fn test_offset_seconds() {
        let t = OdsTime::parse("2026-03-01T00:00:00").unwrap();
        assert_eq!(t.offset_seconds(90).to_iso_seconds(), "2026-03-01T00:01:30");
        assert_eq!(t.offset_seconds(-1).to_iso_seconds(), "2026-02-28T23:59:59");
    }

    #[test]
    fn test_seconds_until() {
        let t1 = OdsTime::parse("2026-03-01T00:00:00").unwrap();
        let t2 = OdsTime::parse("2026-03-01T01:00:00").unwrap();
        assert_eq!(t1.seconds_until(&t2), 3600);
        assert_eq!(t2.seconds_until(&t1), -3600);
    }

    #[test]
    fn test_unix_roundtrip() {
        let t = OdsTime::parse("2026-03-01T12:00:00").unwrap();
        let roundtrip = OdsTime::from_unix_timestamp(t.unix_timestamp());
        assert_eq!(t, roundtrip);
    }

    #[test]
    fn test_serde_roundtrip() {
        let t = OdsTime::parse("2026-03-01T12:00:00").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2026-03-01T12:00:00\"");
        let back: OdsTime = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_generate_observation_times() {
        let start = OdsTime::parse("2026-03-01T00:00:00").unwrap();
        let windows = generate_observation_times(start, &[1200, 600], 1);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].0.to_iso_seconds(), "2026-03-01T00:00:00");
        assert_eq!(windows[0].1.to_iso_seconds(), "2026-03-01T00:20:00");
        assert_eq!(windows[1].0.to_iso_seconds(), "2026-03-01T00:20:01");
        assert_eq!(windows[1].1.to_iso_seconds(), "2026-03-01T00:30:01");
    }

    #[test]
    fn test_generate_observation_times_empty() {
        let start = OdsTime::parse("2026-03-01T00:00:00").unwrap();
        assert!(generate_observation_times(start, &[], 1).is_empty());
    }
}
