//! Datetime conversion between agent-supplied ISO-8601 strings and the
//! provider's wire format.
//!
//! Two concerns live here: converting a local/offset datetime plus an IANA
//! zone name into an offset ISO string for task creation, and leniently
//! parsing the provider's own date strings for filtering.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unparsable datetime {0:?}, expected ISO-8601 (e.g. \"2024-07-26T10:00:00\" or \"2024-07-26\")")]
    Unparsable(String),
    #[error("unknown timezone {0:?}, expected an IANA name like \"America/New_York\"")]
    UnknownTimezone(String),
    #[error("local time {0} does not exist in timezone {1} (DST gap)")]
    NonexistentLocalTime(String, String),
}

/// A converted datetime ready for the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireDatetime {
    /// Offset ISO-8601 string, e.g. `2024-07-26T10:00:00+09:00`
    pub datetime: String,
    /// True when the input was date-only (all-day task)
    pub is_all_day: bool,
    pub time_zone: String,
}

/// Convert an ISO-8601 datetime (with or without offset) or bare date plus
/// an IANA timezone name into the provider's offset form.
///
/// A date-only input is an all-day task and pins to midnight in the zone; an
/// input that already carries an offset keeps its instant and is re-rendered
/// in the zone.
pub fn convert(input: &str, tz_name: &str) -> Result<WireDatetime, FormatError> {
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| FormatError::UnknownTimezone(tz_name.to_string()))?;
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(WireDatetime {
            datetime: format_offset(&dt.with_timezone(&tz)),
            is_all_day: false,
            time_zone: tz_name.to_string(),
        });
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return localize(naive, tz, tz_name, false);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return localize(date.and_time(NaiveTime::MIN), tz, tz_name, true);
    }
    // Agents round-trip dates they fetched, so the provider's own shapes
    // (".000" suffix, compact offsets) convert too
    if let Some(dt) = parse_task_date(trimmed) {
        return Ok(WireDatetime {
            datetime: format_offset(&dt.with_timezone(&tz)),
            is_all_day: false,
            time_zone: tz_name.to_string(),
        });
    }
    Err(FormatError::Unparsable(input.to_string()))
}

fn localize(
    naive: NaiveDateTime,
    tz: Tz,
    tz_name: &str,
    is_all_day: bool,
) -> Result<WireDatetime, FormatError> {
    // Ambiguous local times (DST fold) resolve to the earlier instant
    let dt = tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
        FormatError::NonexistentLocalTime(naive.to_string(), tz_name.to_string())
    })?;
    Ok(WireDatetime {
        datetime: format_offset(&dt),
        is_all_day,
        time_zone: tz_name.to_string(),
    })
}

fn format_offset<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Leniently parse a provider date string.
///
/// Handles the shapes TickTick actually emits: `2024-07-26T10:00:00.000+0000`,
/// colon offsets, `Z`, and bare dates (taken as UTC midnight). Returns `None`
/// when unreadable; filtering treats that as "no date".
pub fn parse_task_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let mut clean = value.trim().replace(".000", "");

    // "+0000" -> "+00:00" so the RFC 3339 parser accepts it
    if clean.len() > 5 && clean.is_ascii() {
        let tail = &clean[clean.len() - 5..];
        if (tail.starts_with('+') || tail.starts_with('-')) && !tail.contains(':') {
            clean.insert(clean.len() - 2, ':');
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&clean) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&clean, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive).fixed_offset());
    }
    if let Some(prefix) = clean.get(0..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).fixed_offset());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_naive_datetime_in_seoul() {
        let wire = convert("2024-07-26T10:00:00", "Asia/Seoul").unwrap();
        assert_eq!(wire.datetime, "2024-07-26T10:00:00+09:00");
        assert!(!wire.is_all_day);
        assert_eq!(wire.time_zone, "Asia/Seoul");
    }

    #[test]
    fn test_convert_date_only_is_all_day() {
        let wire = convert("2024-07-26", "Asia/Seoul").unwrap();
        assert_eq!(wire.datetime, "2024-07-26T00:00:00+09:00");
        assert!(wire.is_all_day);
    }

    #[test]
    fn test_convert_offset_input_keeps_instant() {
        let wire = convert("2024-07-26T10:00:00Z", "Asia/Seoul").unwrap();
        assert_eq!(wire.datetime, "2024-07-26T19:00:00+09:00");
        assert!(!wire.is_all_day);
    }

    #[test]
    fn test_convert_round_trips_provider_shape() {
        // A dueDate copied straight out of a fetched task
        let wire = convert("2024-07-26T10:00:00.000+0000", "Asia/Seoul").unwrap();
        assert_eq!(wire.datetime, "2024-07-26T19:00:00+09:00");
        assert!(!wire.is_all_day);
    }

    #[test]
    fn test_convert_unknown_timezone() {
        let err = convert("2024-07-26T10:00:00", "Mars/Olympus").unwrap_err();
        assert!(matches!(err, FormatError::UnknownTimezone(_)));
    }

    #[test]
    fn test_convert_unparsable_input() {
        let err = convert("next tuesday", "Asia/Seoul").unwrap_err();
        assert!(matches!(err, FormatError::Unparsable(_)));
    }

    #[test]
    fn test_parse_task_date_provider_shapes() {
        let dt = parse_task_date("2024-07-26T10:00:00.000+0000").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-07-26T10:00:00+00:00");

        let dt = parse_task_date("2024-07-26T10:00:00+09:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 9 * 3600);

        let dt = parse_task_date("2024-07-26").unwrap();
        assert_eq!(dt.date_naive().to_string(), "2024-07-26");

        assert!(parse_task_date("whenever").is_none());
        assert!(parse_task_date("").is_none());
    }
}
