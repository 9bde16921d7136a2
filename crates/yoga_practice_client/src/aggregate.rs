//! Daily, weekly and monthly statistics over health readings.
//!
//! Windows are anchored on the most recent reading, not on "now": a week is
//! the calendar day of the newest reading plus the six days before it.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use crate::health::Reading;
use crate::utils::{calendar_day, start_of_day};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Number of calendar days covered by the window.
    pub fn days(self) -> i64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Total,
    Average,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StatKind {
    pub period: Period,
    pub reduction: Reduction,
}

impl StatKind {
    pub const DAILY_TOTAL: StatKind = StatKind::new(Period::Day, Reduction::Total);
    pub const DAILY_AVERAGE: StatKind = StatKind::new(Period::Day, Reduction::Average);
    pub const WEEKLY_TOTAL: StatKind = StatKind::new(Period::Week, Reduction::Total);
    pub const WEEKLY_AVERAGE: StatKind = StatKind::new(Period::Week, Reduction::Average);
    pub const MONTHLY_TOTAL: StatKind = StatKind::new(Period::Month, Reduction::Total);
    pub const MONTHLY_AVERAGE: StatKind = StatKind::new(Period::Month, Reduction::Average);

    pub const fn new(period: Period, reduction: Reduction) -> Self {
        Self { period, reduction }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StatResult {
    pub value: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Total and average over one period window. Computed on demand, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PeriodStatistic {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total: f64,
    pub average: f64,
    pub count: usize,
}

impl PeriodStatistic {
    pub fn get(&self, reduction: Reduction) -> f64 {
        match reduction {
            Reduction::Total => self.total,
            Reduction::Average => self.average,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Aggregator {
    offset: FixedOffset,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::utc()
    }
}

impl Aggregator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn aggregate(
        &self,
        readings: &[Reading],
        kind: StatKind,
        now: DateTime<Utc>,
    ) -> StatResult {
        let stat = self.summarize(readings, kind.period, now);
        StatResult {
            value: stat.get(kind.reduction),
            start: stat.start,
            end: stat.end,
        }
    }

    /// Sum, average and count for the window of `period`. With no readings
    /// the window collapses to `[now, now]` and every figure is zero.
    pub fn summarize(
        &self,
        readings: &[Reading],
        period: Period,
        now: DateTime<Utc>,
    ) -> PeriodStatistic {
        let Some((first_day, last_day, most_recent)) = self.window(readings, period) else {
            return PeriodStatistic {
                period,
                start: now,
                end: now,
                total: 0.0,
                average: 0.0,
                count: 0,
            };
        };

        let (total, count) = readings
            .iter()
            .filter(|r| {
                let day = calendar_day(r.timestamp, self.offset);
                day >= first_day && day <= last_day
            })
            .fold((0.0, 0usize), |(sum, n), r| (sum + r.value, n + 1));

        PeriodStatistic {
            period,
            start: start_of_day(first_day, self.offset),
            end: most_recent,
            total,
            average: if count > 0 { total / count as f64 } else { 0.0 },
            count,
        }
    }

    /// Per-day totals across the window of `period`, oldest first, including
    /// days without readings.
    pub fn daily_series(&self, readings: &[Reading], period: Period) -> Vec<(NaiveDate, f64)> {
        let Some((first_day, last_day, _)) = self.window(readings, period) else {
            return Vec::new();
        };
        let mut series: Vec<(NaiveDate, f64)> = first_day
            .iter_days()
            .take_while(|d| *d <= last_day)
            .map(|d| (d, 0.0))
            .collect();
        for r in readings {
            let day = calendar_day(r.timestamp, self.offset);
            if day < first_day || day > last_day {
                continue;
            }
            let idx = (day - first_day).num_days() as usize;
            series[idx].1 += r.value;
        }
        series
    }

    /// Start of the window `period` would cover for these readings, or
    /// `None` when there are none. Callers use it to check that everything
    /// inside the window was actually fetched.
    pub fn window_start(&self, readings: &[Reading], period: Period) -> Option<DateTime<Utc>> {
        self.window(readings, period)
            .map(|(first_day, _, _)| start_of_day(first_day, self.offset))
    }

    fn window(
        &self,
        readings: &[Reading],
        period: Period,
    ) -> Option<(NaiveDate, NaiveDate, DateTime<Utc>)> {
        let most_recent = readings.iter().map(|r| r.timestamp).max()?;
        let last_day = calendar_day(most_recent, self.offset);
        let first_day = last_day - Duration::days(period.days() - 1);
        Some((first_day, last_day, most_recent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use crate::utils::parse_timestamp;

    fn r(ts: &str, value: f64) -> Reading {
        Reading::new(parse_timestamp(ts).unwrap(), value, Unit::Kilocalories)
    }

    fn now() -> DateTime<Utc> {
        parse_timestamp("2025-03-10T12:00:00Z").unwrap()
    }

    #[test]
    fn daily_and_weekly_totals_for_two_day_sample() {
        let readings = vec![
            r("2025-03-10T08:00:00Z", 10.0),
            r("2025-03-10T09:00:00Z", 20.0),
            r("2025-03-09T09:00:00Z", 5.0),
        ];
        let agg = Aggregator::utc();
        let daily = agg.aggregate(&readings, StatKind::DAILY_TOTAL, now());
        let weekly = agg.aggregate(&readings, StatKind::WEEKLY_TOTAL, now());
        let daily_avg = agg.aggregate(&readings, StatKind::DAILY_AVERAGE, now());
        assert_eq!(daily.value, 30.0);
        assert_eq!(weekly.value, 35.0);
        assert_eq!(daily_avg.value, 15.0);
    }

    #[test]
    fn weekly_window_is_seven_calendar_days_inclusive() {
        let readings = vec![
            r("2025-03-10T08:00:00Z", 1.0),
            // Earlier in the day than the newest reading but still day -6.
            r("2025-03-04T00:30:00Z", 2.0),
            r("2025-03-03T23:59:59Z", 4.0),
        ];
        let stat = Aggregator::utc().summarize(&readings, Period::Week, now());
        assert_eq!(stat.total, 3.0);
        assert_eq!(stat.count, 2);
        assert_eq!(stat.start, parse_timestamp("2025-03-04T00:00:00Z").unwrap());
        assert_eq!(stat.end, parse_timestamp("2025-03-10T08:00:00Z").unwrap());
    }

    #[test]
    fn monthly_window_covers_thirty_days() {
        let readings = vec![
            r("2025-03-30T08:00:00Z", 1.0),
            r("2025-03-01T08:00:00Z", 2.0),
            r("2025-02-28T08:00:00Z", 4.0),
        ];
        let stat = Aggregator::utc().summarize(&readings, Period::Month, now());
        assert_eq!(stat.total, 3.0);
        assert_eq!(stat.average, 1.5);
    }

    #[test]
    fn empty_input_yields_zero_at_now() {
        let agg = Aggregator::utc();
        for kind in [
            StatKind::DAILY_TOTAL,
            StatKind::DAILY_AVERAGE,
            StatKind::WEEKLY_TOTAL,
            StatKind::WEEKLY_AVERAGE,
            StatKind::MONTHLY_TOTAL,
            StatKind::MONTHLY_AVERAGE,
        ] {
            let res = agg.aggregate(&[], kind, now());
            assert_eq!(res.value, 0.0);
            assert_eq!(res.start, now());
            assert_eq!(res.end, now());
        }
    }

    #[test]
    fn daily_window_follows_offset() {
        // 23:30 UTC on the 9th is already the 10th at +02:00.
        let readings = vec![
            r("2025-03-10T08:00:00Z", 10.0),
            r("2025-03-09T23:30:00Z", 7.0),
        ];
        let plus_two = Aggregator::new(FixedOffset::east_opt(2 * 3600).unwrap());
        let utc = Aggregator::utc();
        assert_eq!(
            plus_two.aggregate(&readings, StatKind::DAILY_TOTAL, now()).value,
            17.0
        );
        assert_eq!(
            utc.aggregate(&readings, StatKind::DAILY_TOTAL, now()).value,
            10.0
        );
    }

    #[test]
    fn daily_series_fills_gaps() {
        let readings = vec![
            r("2025-03-10T08:00:00Z", 3.0),
            r("2025-03-08T08:00:00Z", 1.0),
        ];
        let series = Aggregator::utc().daily_series(&readings, Period::Week);
        assert_eq!(series.len(), 7);
        assert_eq!(series[4].1, 1.0);
        assert_eq!(series[5].1, 0.0);
        assert_eq!(series[6].1, 3.0);
        assert!(Aggregator::utc().daily_series(&[], Period::Week).is_empty());
    }

    #[test]
    fn window_start_follows_newest_reading() {
        let readings = vec![
            r("2025-03-07T08:00:00Z", 10.0),
            r("2025-03-02T08:00:00Z", 5.0),
        ];
        let agg = Aggregator::utc();
        assert_eq!(
            agg.window_start(&readings, Period::Week),
            parse_timestamp("2025-03-01T00:00:00Z")
        );
        assert_eq!(
            agg.window_start(&readings, Period::Day),
            parse_timestamp("2025-03-07T00:00:00Z")
        );
        assert_eq!(agg.window_start(&[], Period::Month), None);
    }
}
