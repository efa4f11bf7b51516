//! Wall-clock helpers. The engine works in UTC milliseconds; these functions
//! translate between that and the room's local calendar.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::model::{Ms, TimeRange};

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}

/// Parse an ISO-8601 instant. Strings without an offset are local to `tz`.
pub fn parse_instant(s: &str, tz: Tz) -> Option<Ms> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_ms(naive, tz);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    local_to_ms(date.and_hms_opt(0, 0, 0)?, tz)
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// `date` at `hour:00` local time. `None` if that wall-clock time does not
/// exist (DST gap).
pub fn local_instant(date: NaiveDate, hour: u32, tz: Tz) -> Option<Ms> {
    local_to_ms(date.and_hms_opt(hour, 0, 0)?, tz)
}

/// `[first day 00:00, first day of next month 00:00)` in local time.
/// `month0` is 0-based (January = 0).
pub fn month_range(year: i32, month0: u32, tz: Tz) -> Option<TimeRange> {
    if month0 > 11 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1)?;
    let next = if month0 == 11 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month0 + 2, 1)?
    };
    let start = local_instant(first, 0, tz)?;
    let end = local_instant(next, 0, tz)?;
    Some(TimeRange::new(start, end))
}

pub fn to_utc(ms: Ms) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn local_to_ms(naive: NaiveDateTime, tz: Tz) -> Option<Ms> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}
