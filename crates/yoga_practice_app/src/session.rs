//! The practice session: everything a signed-in user can do, minus the UI.
//!
//! Each operation runs to completion against the remote store or health
//! source (bounded by the configured timeout, abortable via
//! [`PracticeSession::cancel_pending`]) and then publishes its result through
//! the [`StateStore`]. Failures are both returned and recorded in
//! `last_error` as a user-facing message.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Offset, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use yoga_practice_client::timeout::with_deadline;
use yoga_practice_client::utils::{calendar_day, start_of_day};
use yoga_practice_client::{
    Achievement, AchievementRecorder, Aggregator, Challenge, ChallengeCatalog, ChallengeSelector,
    Favorites, HealthSource, KeyValueStore, MergeStrategy, MetricKind, Period, PeriodStatistic,
    ProfileStore, ProfileUpdate, SampleReader, UserProfile, YogaError,
};

use crate::error::{AppError, AppResult};
use crate::state::{PracticeState, StateStore};

/// How far back `refresh_stat` looks for the most recent reading.
pub const LOOKBACK_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    pub utc_offset: FixedOffset,
    pub request_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&yoga_practice_client::config::Config> for SessionSettings {
    fn from(cfg: &yoga_practice_client::config::Config) -> Self {
        Self {
            utc_offset: cfg.utc_offset,
            request_timeout: cfg.request_timeout,
        }
    }
}

pub struct PracticeSession<P, H, K>
where
    P: ProfileStore,
    H: HealthSource,
    K: KeyValueStore + 'static,
{
    profiles: Arc<P>,
    reader: SampleReader<H>,
    local: Arc<K>,
    selector: ChallengeSelector<Arc<K>>,
    recorder: AchievementRecorder<P>,
    aggregator: Aggregator,
    settings: SessionSettings,
    state: StateStore,
    cancel: Mutex<watch::Sender<bool>>,
}

impl<P, H, K> PracticeSession<P, H, K>
where
    P: ProfileStore,
    H: HealthSource,
    K: KeyValueStore + 'static,
{
    pub fn new(
        profiles: Arc<P>,
        health: H,
        local: Arc<K>,
        catalog: ChallengeCatalog,
        settings: SessionSettings,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            recorder: AchievementRecorder::new(profiles.clone()),
            profiles,
            reader: SampleReader::new(health, settings.utc_offset),
            selector: ChallengeSelector::new(local.clone(), catalog)
                .with_offset(settings.utc_offset),
            local,
            aggregator: Aggregator::new(settings.utc_offset),
            settings,
            state: StateStore::new(),
            cancel: Mutex::new(cancel_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PracticeState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PracticeState {
        self.state.snapshot()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn health(&self) -> &H {
        self.reader.source()
    }

    /// Abort every remote call currently in flight. Calls started afterwards
    /// are unaffected.
    pub fn cancel_pending(&self) -> AppResult<()> {
        let mut guard = self
            .cancel
            .lock()
            .map_err(|_| AppError::Internal("cancel lock poisoned".into()))?;
        let _ = guard.send(true);
        let (fresh, _) = watch::channel(false);
        *guard = fresh;
        Ok(())
    }

    fn cancel_token(&self) -> AppResult<watch::Receiver<bool>> {
        self.cancel
            .lock()
            .map(|tx| tx.subscribe())
            .map_err(|_| AppError::Internal("cancel lock poisoned".into()))
    }

    async fn remote<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = Result<T, YogaError>>,
    {
        let token = self.cancel_token()?;
        Ok(with_deadline(fut, self.settings.request_timeout, Some(token)).await?)
    }

    /// Record the outcome in `last_error` and hand it back.
    fn track<T>(&self, res: AppResult<T>) -> AppResult<T> {
        match &res {
            Ok(_) => self.state.update(|s| s.last_error = None),
            Err(e) => {
                tracing::warn!(error = %e, "session operation failed");
                let msg = e.user_message();
                self.state.update(|s| s.last_error = Some(msg));
            }
        }
        res
    }

    fn require_user(&self) -> AppResult<String> {
        self.state
            .snapshot()
            .user_id
            .ok_or_else(|| AppError::Validation("Please sign in first.".into()))
    }

    /// Load the user's profile after authentication. A user without a
    /// profile document gets an empty one.
    pub async fn sign_in(&self, user_id: &str) -> AppResult<UserProfile> {
        let res = self.sign_in_inner(user_id).await;
        self.track(res)
    }

    async fn sign_in_inner(&self, user_id: &str) -> AppResult<UserProfile> {
        let profile = match self.remote(self.profiles.fetch_profile(user_id)).await {
            Ok(p) => {
                metrics::counter!("yoga_sign_ins_total", "profile" => "existing").increment(1);
                p
            }
            Err(AppError::Client(YogaError::NotFound(_))) => {
                let fresh = UserProfile::default();
                self.remote(self.profiles.create_profile(user_id, &fresh))
                    .await?;
                metrics::counter!("yoga_sign_ins_total", "profile" => "created").increment(1);
                tracing::info!(user_id, "created profile on first sign-in");
                fresh
            }
            Err(e) => return Err(e),
        };
        let favorites = Favorites::new(&*self.local).list()?;
        let uid = user_id.to_string();
        let snapshot = profile.clone();
        self.state.update(move |s| {
            s.user_id = Some(uid);
            s.profile = Some(snapshot);
            s.favorites = favorites;
        });
        Ok(profile)
    }

    pub fn sign_out(&self) {
        self.state.update(|s| *s = PracticeState::default());
    }

    pub async fn request_health_access(&self, kinds: &[MetricKind]) -> AppResult<()> {
        let res = self
            .remote(self.reader.source().request_authorization(kinds))
            .await;
        self.track(res)
    }

    /// Query the health source and publish the statistic for `period`.
    ///
    /// The window is anchored on the newest reading found in the last
    /// [`LOOKBACK_DAYS`] calendar days. When that window reaches back past the
    /// first query, the missing span is fetched as well, so the published
    /// total covers every reading inside `[start, end]`.
    pub async fn refresh_stat(
        &self,
        metric: MetricKind,
        period: Period,
        now: DateTime<Utc>,
    ) -> AppResult<PeriodStatistic> {
        let res = self.refresh_stat_inner(metric, period, now).await;
        self.track(res)
    }

    async fn refresh_stat_inner(
        &self,
        metric: MetricKind,
        period: Period,
        now: DateTime<Utc>,
    ) -> AppResult<PeriodStatistic> {
        let offset = self.settings.utc_offset;
        let today = calendar_day(now, offset);
        let searched_from = start_of_day(today - ChronoDuration::days(LOOKBACK_DAYS - 1), offset);
        let mut readings = self
            .remote(self.reader.fetch_range(metric, searched_from, now))
            .await?;

        if let Some(window_start) = self.aggregator.window_start(&readings, period) {
            if window_start < searched_from {
                let older = self
                    .remote(self.reader.fetch_range(
                        metric,
                        window_start,
                        searched_from - ChronoDuration::milliseconds(1),
                    ))
                    .await?;
                readings.extend(older);
            }
        }

        let statistic = self.aggregator.summarize(&readings, period, now);
        self.state.update(|s| s.put_stat(metric, statistic));
        Ok(statistic)
    }

    /// Today's challenge, drawn fresh when the stored one is from another day.
    pub fn load_daily_challenge(&self, now: DateTime<Utc>) -> AppResult<Option<Challenge>> {
        let res = self
            .selector
            .load_challenge_at(now)
            .map_err(AppError::from);
        if let Ok(current) = &res {
            let current = current.clone();
            self.state.update(|s| s.current_challenge = current);
        }
        self.track(res)
    }

    /// Score the current challenge and persist the achievement. Without a
    /// current challenge nothing happens.
    pub async fn complete_challenge(
        &self,
        held: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Achievement>> {
        let res = self.complete_challenge_inner(held, now).await;
        self.track(res)
    }

    async fn complete_challenge_inner(
        &self,
        held: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Achievement>> {
        let user_id = self.require_user()?;
        let current = self.state.snapshot().current_challenge;
        let recorded = self
            .remote(
                self.recorder
                    .complete_challenge(&user_id, current.as_ref(), held, now),
            )
            .await?;
        if let Some(a) = &recorded {
            let a = a.clone();
            self.state.update(|s| {
                if let Some(p) = s.profile.as_mut() {
                    p.exercise_duration += held.as_secs();
                    p.achievements.push(a);
                }
            });
        }
        Ok(recorded)
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> AppResult<()> {
        let res = self.update_profile_inner(update).await;
        self.track(res)
    }

    async fn update_profile_inner(&self, update: ProfileUpdate) -> AppResult<()> {
        let user_id = self.require_user()?;
        if let Some(url) = &update.profile_pic_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(AppError::Validation(format!(
                    "Profile picture must be a web address, got '{url}'."
                )));
            }
        }
        self.remote(
            self.profiles
                .update_profile(&user_id, &update, MergeStrategy::Merge),
        )
        .await?;
        self.state.update(|s| {
            if let Some(p) = s.profile.as_mut() {
                p.apply(&update);
            }
        });
        Ok(())
    }

    /// Flip a pose in the favourites list; returns whether it is now a favourite.
    pub fn toggle_favorite(&self, challenge_id: u32) -> AppResult<bool> {
        let favorites = Favorites::new(&*self.local);
        let res = favorites
            .toggle(challenge_id)
            .and_then(|now_fav| favorites.list().map(|ids| (now_fav, ids)))
            .map_err(AppError::from);
        let res = res.map(|(now_fav, ids)| {
            self.state.update(|s| s.favorites = ids);
            now_fav
        });
        self.track(res)
    }

    /// Delete the remote profile and return to the signed-out state.
    pub async fn delete_account(&self) -> AppResult<()> {
        let res = self.delete_account_inner().await;
        self.track(res)
    }

    async fn delete_account_inner(&self) -> AppResult<()> {
        let user_id = self.require_user()?;
        self.remote(self.profiles.delete_profile(&user_id)).await?;
        tracing::info!(user_id = %user_id, "account deleted");
        self.sign_out();
        Ok(())
    }
}
