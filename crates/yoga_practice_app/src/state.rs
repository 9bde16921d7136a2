//! Observable practice state.
//!
//! The session owns the only [`StateStore`] and is its single writer;
//! presentation layers hold [`watch::Receiver`]s and re-render on change.

use serde::Serialize;
use tokio::sync::watch;
use yoga_practice_client::{Challenge, MetricKind, Period, PeriodStatistic, UserProfile};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetricStat {
    pub metric: MetricKind,
    pub statistic: PeriodStatistic,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct PracticeState {
    pub user_id: Option<String>,
    pub profile: Option<UserProfile>,
    pub current_challenge: Option<Challenge>,
    pub stats: Vec<MetricStat>,
    pub favorites: Vec<u32>,
    /// User-facing message from the most recent failed operation.
    pub last_error: Option<String>,
}

impl PracticeState {
    pub fn stat(&self, metric: MetricKind, period: Period) -> Option<&PeriodStatistic> {
        self.stats
            .iter()
            .find(|s| s.metric == metric && s.statistic.period == period)
            .map(|s| &s.statistic)
    }

    /// Insert or replace the statistic for `(metric, period)`.
    pub fn put_stat(&mut self, metric: MetricKind, statistic: PeriodStatistic) {
        match self
            .stats
            .iter_mut()
            .find(|s| s.metric == metric && s.statistic.period == statistic.period)
        {
            Some(existing) => existing.statistic = statistic,
            None => self.stats.push(MetricStat { metric, statistic }),
        }
    }
}

pub struct StateStore {
    tx: watch::Sender<PracticeState>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PracticeState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PracticeState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> PracticeState {
        self.tx.borrow().clone()
    }

    /// Apply `f` and notify subscribers.
    pub fn update<F: FnOnce(&mut PracticeState)>(&self, f: F) {
        self.tx.send_modify(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stat(period: Period, total: f64) -> PeriodStatistic {
        let now = Utc::now();
        PeriodStatistic {
            period,
            start: now,
            end: now,
            total,
            average: total,
            count: 1,
        }
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let store = StateStore::new();
        let mut rx = store.subscribe();
        store.update(|s| s.favorites.push(3));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().favorites, vec![3]);
    }

    #[test]
    fn update_without_subscribers_still_applies() {
        let store = StateStore::new();
        store.update(|s| s.user_id = Some("u1".into()));
        assert_eq!(store.snapshot().user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn put_stat_replaces_same_metric_and_period() {
        let mut state = PracticeState::default();
        state.put_stat(MetricKind::Distance, stat(Period::Week, 1.0));
        state.put_stat(MetricKind::Distance, stat(Period::Day, 2.0));
        state.put_stat(MetricKind::Distance, stat(Period::Week, 3.0));
        assert_eq!(state.stats.len(), 2);
        assert_eq!(
            state.stat(MetricKind::Distance, Period::Week).unwrap().total,
            3.0
        );
    }
}
