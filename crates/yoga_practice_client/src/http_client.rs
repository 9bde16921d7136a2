//! Firestore REST implementation of [`ProfileStore`](crate::ProfileStore).
//!
//! Profiles live in the `users` collection, one document per user id. Every
//! call is a single attempt bounded by the configured request timeout.

use crate::achievement::Achievement;
use crate::config::Config;
use crate::firestore;
use crate::profile::{MergeStrategy, ProfileUpdate, UserProfile};
use crate::timeout::with_deadline;
use crate::{ProfileStore, YogaError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

const COLLECTION: &str = "users";

#[derive(Clone, Debug)]
pub struct FirestoreProfileStore {
    base_url: String,
    project_id: String,
    id_token: SecretString,
    timeout: Duration,
    client: reqwest::Client,
}

impl FirestoreProfileStore {
    /// Create a new store client.
    ///
    /// # Arguments
    /// * `base_url` - Firestore endpoint (e.g. "https://firestore.googleapis.com")
    /// * `project_id` - The Firebase project hosting the `users` collection
    /// * `id_token` - Firebase ID token of the signed-in user
    pub fn new(base_url: &str, project_id: impl Into<String>, id_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("reqwest client build should not fail");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            id_token,
            timeout: Duration::from_secs(10),
            client,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.base_url, cfg.project_id.clone(), cfg.id_token.clone())
            .with_timeout(cfg.request_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn document_name(&self, user_id: &str) -> String {
        format!("{}/{}/{}", self.database_path(), COLLECTION, user_id)
    }

    fn document_url(&self, user_id: &str) -> String {
        format!("{}/v1/{}", self.base_url, self.document_name(user_id))
    }

    fn commit_url(&self) -> String {
        format!("{}/v1/{}:commit", self.base_url, self.database_path())
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.id_token.expose_secret())
    }

    fn validate_user_id(user_id: &str) -> Result<(), YogaError> {
        if user_id.is_empty() || user_id.contains('/') {
            return Err(YogaError::InvalidInput(format!(
                "invalid user id '{user_id}'"
            )));
        }
        Ok(())
    }

    /// Run one request under the deadline and count its outcome.
    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, YogaError>
    where
        F: Future<Output = Result<T, YogaError>>,
    {
        tracing::debug!(op, "profile store request");
        let res = with_deadline(fut, self.timeout, None).await;
        crate::observability::record_store_call(op, res.is_ok());
        if let Err(e) = &res {
            tracing::warn!(op, error = %e, "profile store request failed");
        }
        res
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, YogaError> {
        let resp = self.authed(req).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }
        Ok(resp)
    }

    /// Extract error information from a failed response.
    async fn error_from_response(resp: reqwest::Response) -> YogaError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        YogaError::from_status(status, body_snippet)
    }

    /// Apply field transforms to one document in a single committed write.
    async fn commit_transforms(
        &self,
        user_id: &str,
        transforms: Vec<Value>,
    ) -> Result<(), YogaError> {
        let body = json!({
            "writes": [{
                "transform": {
                    "document": self.document_name(user_id),
                    "fieldTransforms": transforms,
                }
            }]
        });
        self.send(self.client.post(self.commit_url()).json(&body))
            .await
            .map(|_| ())
    }
}

fn append_transform(achievement: &Achievement) -> Value {
    json!({
        "fieldPath": firestore::ACHIEVEMENTS,
        "appendMissingElements": {
            "values": [firestore::encode_achievement(achievement)]
        }
    })
}

fn increment_transform(seconds: u64) -> Value {
    json!({
        "fieldPath": firestore::EXERCISE_DURATION,
        "increment": firestore::integer_value(seconds),
    })
}

#[async_trait]
impl ProfileStore for FirestoreProfileStore {
    async fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, YogaError> {
        Self::validate_user_id(user_id)?;
        self.run("fetch_profile", async {
            let resp = self.send(self.client.get(self.document_url(user_id))).await?;
            // Read as text first so decode failures can quote the body.
            let text = resp.text().await?;
            let doc: Value = serde_json::from_str(&text).map_err(|e| {
                let body_snippet: String = text.chars().take(512).collect();
                YogaError::Decode(format!("profile document: {e} - body: {body_snippet}"))
            })?;
            firestore::decode_profile(&doc)
        })
        .await
    }

    async fn create_profile(
        &self,
        user_id: &str,
        profile: &UserProfile,
    ) -> Result<(), YogaError> {
        Self::validate_user_id(user_id)?;
        let body = firestore::encode_profile(profile);
        self.run("create_profile", async {
            self.send(self.client.patch(self.document_url(user_id)).json(&body))
                .await
                .map(|_| ())
        })
        .await
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        strategy: MergeStrategy,
    ) -> Result<(), YogaError> {
        Self::validate_user_id(user_id)?;
        let (body, mask) = firestore::encode_update(update);
        if strategy == MergeStrategy::Merge && mask.is_empty() {
            return Ok(());
        }
        self.run("update_profile", async {
            let mut req = self.client.patch(self.document_url(user_id)).json(&body);
            if strategy == MergeStrategy::Merge {
                let qp: Vec<(&str, &str)> =
                    mask.iter().map(|f| ("updateMask.fieldPaths", *f)).collect();
                req = req.query(&qp);
            }
            self.send(req).await.map(|_| ())
        })
        .await
    }

    async fn append_achievement(
        &self,
        user_id: &str,
        achievement: &Achievement,
    ) -> Result<(), YogaError> {
        Self::validate_user_id(user_id)?;
        self.run(
            "append_achievement",
            self.commit_transforms(user_id, vec![append_transform(achievement)]),
        )
        .await
    }

    async fn add_exercise_duration(
        &self,
        user_id: &str,
        seconds: u64,
    ) -> Result<(), YogaError> {
        Self::validate_user_id(user_id)?;
        self.run(
            "add_exercise_duration",
            self.commit_transforms(user_id, vec![increment_transform(seconds)]),
        )
        .await
    }

    async fn record_completion(
        &self,
        user_id: &str,
        achievement: &Achievement,
        seconds: u64,
    ) -> Result<(), YogaError> {
        Self::validate_user_id(user_id)?;
        let transforms = vec![append_transform(achievement), increment_transform(seconds)];
        self.run(
            "record_completion",
            self.commit_transforms(user_id, transforms),
        )
        .await
    }

    async fn delete_profile(&self, user_id: &str) -> Result<(), YogaError> {
        Self::validate_user_id(user_id)?;
        self.run("delete_profile", async {
            self.send(self.client.delete(self.document_url(user_id)))
                .await
                .map(|_| ())
        })
        .await
    }
}
