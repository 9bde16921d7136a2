//! The user profile record kept in the remote document store.

use serde::{Deserialize, Serialize};

use crate::achievement::Achievement;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Empty when the user never set one.
    pub full_name: String,
    pub profile_pic_url: Option<String>,
    /// Cumulative exercise time in seconds.
    pub exercise_duration: u64,
    pub achievements: Vec<Achievement>,
}

impl UserProfile {
    /// Apply a partial update locally, the same way a merge write would.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.full_name {
            self.full_name = name.clone();
        }
        if let Some(url) = &update.profile_pic_url {
            self.profile_pic_url = Some(url.clone());
        }
        if let Some(d) = update.exercise_duration {
            self.exercise_duration = d;
        }
    }
}

/// Fields to change; `None` leaves the stored value alone under
/// [`MergeStrategy::Merge`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub exercise_duration: Option<u64>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.profile_pic_url.is_none()
            && self.exercise_duration.is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Only the provided fields are written.
    #[default]
    Merge,
    /// The document is replaced by the provided fields.
    Replace,
}
