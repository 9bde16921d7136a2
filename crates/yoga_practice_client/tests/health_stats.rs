use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use yoga_practice_client::utils::parse_timestamp;
use yoga_practice_client::{
    Aggregator, HealthSource, InMemoryHealthSource, MetricKind, Period, Reading, SampleReader,
    StatKind, Unit, YogaError,
};

fn ts(s: &str) -> DateTime<Utc> {
    parse_timestamp(s).unwrap()
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

async fn distance_reader() -> SampleReader<InMemoryHealthSource> {
    let source = InMemoryHealthSource::new();
    source
        .insert(
            MetricKind::Distance,
            [
                Reading::new(ts("2025-03-10T08:00:00Z"), 10_000.0, Unit::Meters),
                Reading::new(ts("2025-03-10T18:00:00Z"), 20_000.0, Unit::Meters),
                Reading::new(ts("2025-03-09T07:00:00Z"), 5_000.0, Unit::Meters),
                Reading::new(ts("2025-02-01T07:00:00Z"), 1_000.0, Unit::Meters),
            ],
        )
        .await;
    source
        .request_authorization(&[MetricKind::Distance])
        .await
        .unwrap();
    SampleReader::new(source, utc())
}

#[tokio::test]
async fn distance_stats_are_in_kilometers_for_every_period() {
    let reader = distance_reader().await;
    let readings = reader
        .fetch_range(
            MetricKind::Distance,
            ts("2025-01-01T00:00:00Z"),
            ts("2025-03-11T00:00:00Z"),
        )
        .await
        .unwrap();
    let now = ts("2025-03-10T21:00:00Z");
    let agg = Aggregator::new(utc());

    assert_eq!(agg.aggregate(&readings, StatKind::DAILY_TOTAL, now).value, 30.0);
    assert_eq!(agg.aggregate(&readings, StatKind::WEEKLY_TOTAL, now).value, 35.0);
    assert_eq!(agg.aggregate(&readings, StatKind::MONTHLY_TOTAL, now).value, 35.0);

    let week = agg.summarize(&readings, Period::Week, now);
    assert_eq!(week.count, 3);
    assert!((week.average - 35.0 / 3.0).abs() < 1e-9);
    assert!(week.end >= week.start);
}

#[tokio::test]
async fn fetch_day_only_returns_that_day() {
    let reader = distance_reader().await;
    let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    let readings = reader.fetch_day(MetricKind::Distance, day).await.unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].value, 5.0);
}

#[tokio::test]
async fn denied_permission_surfaces_message() {
    let reader = SampleReader::new(InMemoryHealthSource::denying(), utc());
    reader
        .source()
        .request_authorization(&[MetricKind::OxygenSaturation])
        .await
        .unwrap();
    let err = reader
        .fetch_day(
            MetricKind::OxygenSaturation,
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, YogaError::Unauthorized(MetricKind::OxygenSaturation)));
    assert!(err.user_message().contains("oxygen saturation"));
}

#[tokio::test]
async fn no_readings_yield_zero_stats_at_now() {
    let reader = distance_reader().await;
    let readings = reader
        .fetch_range(
            MetricKind::Distance,
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-02T00:00:00Z"),
        )
        .await
        .unwrap();
    assert!(readings.is_empty());
    let now = ts("2025-03-10T21:00:00Z");
    let res = Aggregator::new(utc()).aggregate(&readings, StatKind::WEEKLY_AVERAGE, now);
    assert_eq!(res.value, 0.0);
    assert_eq!((res.start, res.end), (now, now));
}
