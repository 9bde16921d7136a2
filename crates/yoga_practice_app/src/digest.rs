//! Daily digest: today's challenge plus day/week/month figures for every
//! metric the health source holds.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use yoga_practice_client::utils::calendar_day;
use yoga_practice_client::{
    Challenge, HealthSource, KeyValueStore, MetricKind, Period, ProfileStore, UserProfile,
};

use crate::error::AppResult;
use crate::session::PracticeSession;
use crate::state::MetricStat;

#[derive(Debug, Serialize)]
pub struct Digest {
    pub date: NaiveDate,
    pub challenge: Option<Challenge>,
    pub favorites: Vec<u32>,
    pub stats: Vec<MetricStat>,
    pub profile: Option<UserProfile>,
    /// Metrics that could not be read, with the reason shown to the user.
    pub skipped: Vec<(MetricKind, String)>,
}

pub async fn build_digest<P, H, K>(
    session: &PracticeSession<P, H, K>,
    metrics: &[MetricKind],
    now: DateTime<Utc>,
) -> AppResult<Digest>
where
    P: ProfileStore,
    H: HealthSource,
    K: KeyValueStore + 'static,
{
    let challenge = session.load_daily_challenge(now)?;
    session.request_health_access(metrics).await?;

    let mut skipped = Vec::new();
    for &metric in metrics {
        for period in [Period::Day, Period::Week, Period::Month] {
            if let Err(e) = session.refresh_stat(metric, period, now).await {
                tracing::warn!(metric = %metric, error = %e, "skipping metric");
                skipped.push((metric, e.user_message()));
                break;
            }
        }
    }

    let state = session.state();
    Ok(Digest {
        date: calendar_day(now, session.settings().utc_offset),
        challenge,
        favorites: state.favorites,
        stats: state.stats,
        profile: state.profile,
        skipped,
    })
}
