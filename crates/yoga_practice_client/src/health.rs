//! Health sample reading.
//!
//! [`HealthSource`] is the boundary to the platform health database. The
//! [`SampleReader`] on top of it checks authorization, validates values and
//! converts every reading into its metric's canonical unit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tokio::sync::RwLock;

use crate::YogaError;
use crate::units::{Quantity, Unit};
use crate::utils::start_of_day;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    Distance,
    ActiveEnergy,
    BodyMassIndex,
    Height,
    OxygenSaturation,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::HeartRate,
        MetricKind::Distance,
        MetricKind::ActiveEnergy,
        MetricKind::BodyMassIndex,
        MetricKind::Height,
        MetricKind::OxygenSaturation,
    ];

    /// Unit readings of this metric carry once they leave [`SampleReader`].
    pub fn canonical_unit(self) -> Unit {
        match self {
            MetricKind::HeartRate => Unit::BeatsPerMinute,
            MetricKind::Distance => Unit::Kilometers,
            MetricKind::ActiveEnergy => Unit::Kilocalories,
            MetricKind::BodyMassIndex => Unit::KilogramsPerSquareMeter,
            MetricKind::Height => Unit::Centimeters,
            MetricKind::OxygenSaturation => Unit::Percent,
        }
    }

    /// Every metric here is a physiological quantity, so none may be negative.
    pub fn allows_negative(self) -> bool {
        false
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart rate",
            MetricKind::Distance => "distance",
            MetricKind::ActiveEnergy => "active energy",
            MetricKind::BodyMassIndex => "body mass index",
            MetricKind::Height => "height",
            MetricKind::OxygenSaturation => "oxygen saturation",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One timestamped health sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: Unit,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64, unit: Unit) -> Self {
        Self {
            timestamp,
            value,
            unit,
        }
    }

    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.value, self.unit)
    }
}

#[async_trait]
pub trait HealthSource: Send + Sync + 'static {
    /// Ask for read access to the given metrics. Returns once the platform
    /// has answered; access may still have been denied.
    async fn request_authorization(&self, metrics: &[MetricKind]) -> Result<(), YogaError>;

    async fn is_authorized(&self, metric: MetricKind) -> bool;

    /// Samples of `metric` with `start <= timestamp <= end`, in source units.
    async fn query(
        &self,
        metric: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, YogaError>;
}

pub struct SampleReader<H> {
    source: H,
    offset: FixedOffset,
}

impl<H: HealthSource> SampleReader<H> {
    pub fn new(source: H, offset: FixedOffset) -> Self {
        Self { source, offset }
    }

    pub fn source(&self) -> &H {
        &self.source
    }

    /// All readings on the calendar day `day`.
    pub async fn fetch_day(
        &self,
        metric: MetricKind,
        day: NaiveDate,
    ) -> Result<Vec<Reading>, YogaError> {
        let start = start_of_day(day, self.offset);
        let end = start + Duration::days(1) - Duration::milliseconds(1);
        self.fetch_range(metric, start, end).await
    }

    /// Readings in `[start, end]`, converted to the metric's canonical unit
    /// and sorted by timestamp.
    pub async fn fetch_range(
        &self,
        metric: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, YogaError> {
        if end < start {
            return Err(YogaError::InvalidInput(format!(
                "query range ends ({end}) before it starts ({start})"
            )));
        }
        if !self.source.is_authorized(metric).await {
            return Err(YogaError::Unauthorized(metric));
        }

        let raw = self.source.query(metric, start, end).await?;
        tracing::debug!(metric = %metric, count = raw.len(), "health query returned");
        crate::observability::record_health_query(metric, raw.len());

        let target = metric.canonical_unit();
        let mut readings = raw
            .into_iter()
            .map(|r| {
                if !r.value.is_finite() {
                    return Err(YogaError::InvalidInput(format!(
                        "non-finite {metric} reading at {}",
                        r.timestamp
                    )));
                }
                if !metric.allows_negative() && r.value < 0.0 {
                    return Err(YogaError::InvalidInput(format!(
                        "negative {metric} reading at {}",
                        r.timestamp
                    )));
                }
                let q = r.quantity().to(target)?;
                Ok(Reading::new(r.timestamp, q.value, q.unit))
            })
            .collect::<Result<Vec<_>, YogaError>>()?;
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }
}

/// A health source held in memory, loadable from a JSON export of the form
/// `{"distance": [{"timestamp": "...", "value": 1200.0, "unit": "meters"}]}`.
#[derive(Default)]
pub struct InMemoryHealthSource {
    samples: RwLock<HashMap<MetricKind, Vec<Reading>>>,
    authorized: RwLock<HashSet<MetricKind>>,
    grant_on_request: bool,
}

impl InMemoryHealthSource {
    /// A source that grants every authorization request.
    pub fn new() -> Self {
        Self {
            grant_on_request: true,
            ..Self::default()
        }
    }

    /// A source that denies every authorization request.
    pub fn denying() -> Self {
        Self::default()
    }

    pub async fn insert(&self, metric: MetricKind, readings: impl IntoIterator<Item = Reading>) {
        self.samples
            .write()
            .await
            .entry(metric)
            .or_default()
            .extend(readings);
    }

    pub async fn metrics(&self) -> Vec<MetricKind> {
        let samples = self.samples.read().await;
        MetricKind::ALL
            .into_iter()
            .filter(|m| samples.get(m).is_some_and(|v| !v.is_empty()))
            .collect()
    }

    pub async fn load_export(path: &Path) -> Result<Self, YogaError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| YogaError::Storage(format!("reading {}: {e}", path.display())))?;
        let parsed: HashMap<MetricKind, Vec<Reading>> = serde_json::from_str(&text)
            .map_err(|e| YogaError::Decode(format!("health export {}: {e}", path.display())))?;
        let source = Self::new();
        for (metric, readings) in parsed {
            source.insert(metric, readings).await;
        }
        Ok(source)
    }
}

#[async_trait]
impl HealthSource for InMemoryHealthSource {
    async fn request_authorization(&self, metrics: &[MetricKind]) -> Result<(), YogaError> {
        if self.grant_on_request {
            self.authorized.write().await.extend(metrics.iter().copied());
        }
        Ok(())
    }

    async fn is_authorized(&self, metric: MetricKind) -> bool {
        self.authorized.read().await.contains(&metric)
    }

    async fn query(
        &self,
        metric: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reading>, YogaError> {
        let samples = self.samples.read().await;
        Ok(samples
            .get(&metric)
            .map(|v| {
                v.iter()
                    .filter(|r| r.timestamp >= start && r.timestamp <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_timestamp;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[tokio::test]
    async fn fetch_requires_authorization() {
        let reader = SampleReader::new(InMemoryHealthSource::denying(), utc());
        reader
            .source()
            .request_authorization(&[MetricKind::HeartRate])
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let res = reader.fetch_day(MetricKind::HeartRate, day).await;
        assert!(matches!(
            res,
            Err(YogaError::Unauthorized(MetricKind::HeartRate))
        ));
    }

    #[tokio::test]
    async fn distance_is_converted_to_kilometers_once() {
        let source = InMemoryHealthSource::new();
        source
            .insert(
                MetricKind::Distance,
                [
                    Reading::new(ts("2025-03-01T08:00:00Z"), 1500.0, Unit::Meters),
                    Reading::new(ts("2025-03-01T18:00:00Z"), 500.0, Unit::Meters),
                    Reading::new(ts("2025-03-02T08:00:00Z"), 900.0, Unit::Meters),
                ],
            )
            .await;
        source
            .request_authorization(&[MetricKind::Distance])
            .await
            .unwrap();
        let reader = SampleReader::new(source, utc());

        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let readings = reader.fetch_day(MetricKind::Distance, day).await.unwrap();
        assert_eq!(readings.len(), 2);
        assert!(readings.iter().all(|r| r.unit == Unit::Kilometers));
        assert!((readings[0].value - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn negative_values_are_rejected() {
        let source = InMemoryHealthSource::new();
        source
            .insert(
                MetricKind::HeartRate,
                [Reading::new(
                    ts("2025-03-01T08:00:00Z"),
                    -3.0,
                    Unit::BeatsPerMinute,
                )],
            )
            .await;
        source
            .request_authorization(&[MetricKind::HeartRate])
            .await
            .unwrap();
        let reader = SampleReader::new(source, utc());
        let res = reader
            .fetch_range(
                MetricKind::HeartRate,
                ts("2025-03-01T00:00:00Z"),
                ts("2025-03-02T00:00:00Z"),
            )
            .await;
        assert!(matches!(res, Err(YogaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn non_finite_values_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY] {
            let source = InMemoryHealthSource::new();
            source
                .insert(
                    MetricKind::ActiveEnergy,
                    [
                        Reading::new(ts("2025-03-01T08:00:00Z"), 12.0, Unit::Kilocalories),
                        Reading::new(ts("2025-03-01T09:00:00Z"), bad, Unit::Kilocalories),
                    ],
                )
                .await;
            source
                .request_authorization(&[MetricKind::ActiveEnergy])
                .await
                .unwrap();
            let reader = SampleReader::new(source, utc());
            let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
            let res = reader.fetch_day(MetricKind::ActiveEnergy, day).await;
            assert!(matches!(res, Err(YogaError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let reader = SampleReader::new(InMemoryHealthSource::new(), utc());
        let res = reader
            .fetch_range(
                MetricKind::Height,
                ts("2025-03-02T00:00:00Z"),
                ts("2025-03-01T00:00:00Z"),
            )
            .await;
        assert!(matches!(res, Err(YogaError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn load_export_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(
            &path,
            r#"{"active_energy":[{"timestamp":"2025-03-01T08:00:00Z","value":120.0,"unit":"kilocalories"}]}"#,
        )
        .unwrap();
        let source = InMemoryHealthSource::load_export(&path).await.unwrap();
        assert_eq!(source.metrics().await, vec![MetricKind::ActiveEnergy]);
    }
}
