//! Metric hooks. Without an installed recorder these are no-ops.

use crate::achievement::Trophy;
use crate::health::MetricKind;

pub fn record_store_call(op: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("yoga_store_requests_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_health_query(metric: MetricKind, readings: usize) {
    metrics::histogram!("yoga_health_query_readings", "metric" => metric.label())
        .record(readings as f64);
}

pub fn record_challenge_rollover() {
    metrics::counter!("yoga_challenge_rollovers_total").increment(1);
}

pub fn record_achievement(trophy: Trophy) {
    metrics::counter!("yoga_achievements_recorded_total", "trophy" => trophy.as_str())
        .increment(1);
}
