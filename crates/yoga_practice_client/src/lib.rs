//! Core of the yoga practice tracker: health sample reading and aggregation,
//! the daily challenge, achievement tiers and the remote profile store.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod achievement;
pub mod aggregate;
pub mod challenge;
pub mod config;
pub mod firestore;
pub mod health;
pub mod http_client;
pub mod kv_store;
pub mod observability;
pub mod profile;
pub mod timeout;
pub mod units;
pub mod utils;

pub use achievement::{Achievement, AchievementRecorder, Trophy};
pub use aggregate::{Aggregator, Period, PeriodStatistic, Reduction, StatKind, StatResult};
pub use challenge::{Challenge, ChallengeCatalog, ChallengeSelector};
pub use health::{HealthSource, InMemoryHealthSource, MetricKind, Reading, SampleReader};
pub use kv_store::{Favorites, JsonFileStore, KeyValueStore, MemoryStore};
pub use profile::{MergeStrategy, ProfileUpdate, UserProfile};
pub use units::{Quantity, Unit};

#[derive(Debug, Error)]
pub enum YogaError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("decoding error: {0}")]
    Decode(String),
    #[error("health data access not authorized for {0}")]
    Unauthorized(MetricKind),
    #[error("local storage error: {0}")]
    Storage(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("operation cancelled")]
    Cancelled,
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl YogaError {
    /// Map a non-success status that has no dedicated variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => YogaError::Auth(body),
            404 => YogaError::NotFound(body),
            400 | 422 => YogaError::InvalidInput(body),
            _ => YogaError::Api { status, body },
        }
    }

    /// The message shown to the user. Errors are surfaced, never retried.
    pub fn user_message(&self) -> String {
        match self {
            YogaError::Http(_) => {
                "Could not reach the server. Check your connection and try again.".into()
            }
            YogaError::Config(_) => "The app is not configured correctly.".into(),
            YogaError::Auth(_) => "Your session has expired. Please sign in again.".into(),
            YogaError::NotFound(_) => "The requested record could not be found.".into(),
            YogaError::InvalidInput(msg) => format!("Invalid input: {msg}"),
            YogaError::Decode(_) => "Received data in an unexpected format.".into(),
            YogaError::Unauthorized(metric) => {
                format!("Allow access to {} in Health settings to see this data.", metric)
            }
            YogaError::Storage(_) => "Could not save data on this device.".into(),
            YogaError::Timeout(_) => "The request took too long. Please try again.".into(),
            YogaError::Cancelled => "The request was cancelled.".into(),
            YogaError::Api { status, .. } => format!("The server returned an error ({status})."),
        }
    }
}

/// Remote store of user profiles, keyed by user id.
///
/// Writes are last-writer-wins; nothing here reconciles concurrent edits
/// coming from different devices.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, YogaError>;

    /// Create (or overwrite) the profile document.
    async fn create_profile(&self, user_id: &str, profile: &UserProfile)
    -> Result<(), YogaError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        strategy: MergeStrategy,
    ) -> Result<(), YogaError>;

    /// Append to the achievement list. Existing entries are never rewritten.
    async fn append_achievement(
        &self,
        user_id: &str,
        achievement: &Achievement,
    ) -> Result<(), YogaError>;

    /// Add `seconds` to the cumulative exercise duration.
    async fn add_exercise_duration(&self, user_id: &str, seconds: u64)
    -> Result<(), YogaError>;

    /// Append `achievement` and add `seconds` to the exercise total in one
    /// write: either both land or neither does.
    async fn record_completion(
        &self,
        user_id: &str,
        achievement: &Achievement,
        seconds: u64,
    ) -> Result<(), YogaError>;

    /// Remove the profile document (account deletion).
    async fn delete_profile(&self, user_id: &str) -> Result<(), YogaError>;
}
