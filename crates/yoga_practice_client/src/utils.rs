//! Calendar-day helpers and date parsing shared by the aggregator, the
//! challenge selector and the decoders.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// The calendar day `ts` falls on, as seen from `offset`.
pub fn calendar_day(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// Whether two instants fall on the same calendar day in `offset`.
pub fn is_same_day(a: DateTime<Utc>, b: DateTime<Utc>, offset: FixedOffset) -> bool {
    calendar_day(a, offset) == calendar_day(b, offset)
}

/// Midnight at the start of `day` in `offset`, as a UTC instant.
pub fn start_of_day(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = day.and_time(NaiveTime::MIN);
    // A fixed offset has no gaps or folds, so the mapping is always single.
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Parse an instant given as RFC3339, naive datetime (taken as UTC) or a bare
/// date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_normalizes_to_utc() {
        let ts = parse_timestamp("2025-12-15T10:30:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-12-15T08:30:00+00:00");
    }

    #[test]
    fn calendar_day_respects_offset() {
        let ts = parse_timestamp("2025-12-15T23:30:00Z").unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            calendar_day(ts, plus_two),
            NaiveDate::from_ymd_opt(2025, 12, 16).unwrap()
        );
        assert_eq!(
            calendar_day(ts, utc),
            NaiveDate::from_ymd_opt(2025, 12, 15).unwrap()
        );
        assert!(!is_same_day(ts, ts + chrono::Duration::hours(1), utc));
    }

    #[test]
    fn start_of_day_applies_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();
        assert_eq!(
            start_of_day(day, plus_two).to_rfc3339(),
            "2025-12-14T22:00:00+00:00"
        );
    }
}
