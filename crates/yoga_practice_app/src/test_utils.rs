//! Shared test utilities: an in-memory `ProfileStore` used by unit tests.
#![cfg(test)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use yoga_practice_client::{
    Achievement, MergeStrategy, ProfileStore, ProfileUpdate, UserProfile, YogaError,
};

#[derive(Default)]
pub struct MemoryProfileStore {
    pub docs: Mutex<HashMap<String, UserProfile>>,
    /// When set, every call fails with a 503.
    pub unavailable: AtomicBool,
    /// Artificial latency applied before every call.
    pub latency: Option<Duration>,
}

impl MemoryProfileStore {
    pub fn with_profile(user_id: &str, profile: UserProfile) -> Self {
        let mut docs = HashMap::new();
        docs.insert(user_id.to_string(), profile);
        Self {
            docs: Mutex::new(docs),
            ..Self::default()
        }
    }

    pub fn slow(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub async fn doc(&self, user_id: &str) -> Option<UserProfile> {
        self.docs.lock().await.get(user_id).cloned()
    }

    async fn gate(&self) -> Result<(), YogaError> {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(YogaError::from_status(503, "unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, YogaError> {
        self.gate().await?;
        self.doc(user_id)
            .await
            .ok_or_else(|| YogaError::NotFound(user_id.to_string()))
    }

    async fn create_profile(&self, user_id: &str, profile: &UserProfile) -> Result<(), YogaError> {
        self.gate().await?;
        self.docs
            .lock()
            .await
            .insert(user_id.to_string(), profile.clone());
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        strategy: MergeStrategy,
    ) -> Result<(), YogaError> {
        self.gate().await?;
        let mut docs = self.docs.lock().await;
        let doc = docs.entry(user_id.to_string()).or_default();
        if strategy == MergeStrategy::Replace {
            *doc = UserProfile::default();
        }
        doc.apply(update);
        Ok(())
    }

    async fn append_achievement(
        &self,
        user_id: &str,
        achievement: &Achievement,
    ) -> Result<(), YogaError> {
        self.gate().await?;
        self.docs
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .achievements
            .push(achievement.clone());
        Ok(())
    }

    async fn add_exercise_duration(&self, user_id: &str, seconds: u64) -> Result<(), YogaError> {
        self.gate().await?;
        self.docs
            .lock()
            .await
            .entry(user_id.to_string())
            .or_default()
            .exercise_duration += seconds;
        Ok(())
    }

    async fn record_completion(
        &self,
        user_id: &str,
        achievement: &Achievement,
        seconds: u64,
    ) -> Result<(), YogaError> {
        self.gate().await?;
        let mut docs = self.docs.lock().await;
        let doc = docs.entry(user_id.to_string()).or_default();
        doc.achievements.push(achievement.clone());
        doc.exercise_duration += seconds;
        Ok(())
    }

    async fn delete_profile(&self, user_id: &str) -> Result<(), YogaError> {
        self.gate().await?;
        self.docs
            .lock()
            .await
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| YogaError::NotFound(user_id.to_string()))
    }
}
