use crate::YogaError;
use chrono::FixedOffset;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub project_id: String,
    pub id_token: SecretString,
    pub base_url: String,
    pub request_timeout: Duration,
    pub local_store_path: PathBuf,
    /// Offset that defines calendar days for stats and the daily challenge.
    pub utc_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Result<Self, YogaError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function, so tests never touch the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, YogaError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let project_id = get("YOGA_FIRESTORE_PROJECT_ID")
            .ok_or_else(|| YogaError::Config("YOGA_FIRESTORE_PROJECT_ID missing".into()))?;
        let token = get("YOGA_FIREBASE_ID_TOKEN")
            .ok_or_else(|| YogaError::Config("YOGA_FIREBASE_ID_TOKEN missing".into()))?;
        let base_url = get("YOGA_FIRESTORE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let timeout_secs = match get("YOGA_REQUEST_TIMEOUT_SECS") {
            None => 10,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    YogaError::Config(format!("YOGA_REQUEST_TIMEOUT_SECS invalid: {raw}"))
                })?,
        };

        let local_store_path = get("YOGA_LOCAL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("yoga_practice_store.json"));

        let offset_minutes = match get("YOGA_UTC_OFFSET_MINUTES") {
            None => 0,
            Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
                YogaError::Config(format!("YOGA_UTC_OFFSET_MINUTES invalid: {raw}"))
            })?,
        };
        let utc_offset = Some(offset_minutes)
            .filter(|m| m.unsigned_abs() < 24 * 60)
            .and_then(|m| FixedOffset::east_opt(m * 60))
            .ok_or_else(|| {
                YogaError::Config(format!(
                    "YOGA_UTC_OFFSET_MINUTES out of range: {offset_minutes}"
                ))
            })?;

        Ok(Self {
            project_id,
            id_token: SecretString::new(token.into()),
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            local_store_path,
            utc_offset,
        })
    }
}
