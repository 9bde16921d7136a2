//! Trophies for completed challenges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::challenge::Challenge;
use crate::{ProfileStore, YogaError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trophy {
    Gold,
    Silver,
    Bronze,
}

impl Trophy {
    /// Tier for holding a pose of `difficulty` for `held`. Thresholds are
    /// exclusive: exactly 90 s on an easy pose is silver, not gold.
    /// Difficulties outside 1..=3 always earn bronze.
    pub fn for_result(difficulty: u8, held: Duration) -> Trophy {
        let (gold, silver) = match difficulty {
            1 => (90.0, 60.0),
            2 => (120.0, 90.0),
            3 => (150.0, 120.0),
            _ => return Trophy::Bronze,
        };
        let secs = held.as_secs_f64();
        if secs > gold {
            Trophy::Gold
        } else if secs > silver {
            Trophy::Silver
        } else {
            Trophy::Bronze
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trophy::Gold => "gold",
            Trophy::Silver => "silver",
            Trophy::Bronze => "bronze",
        }
    }
}

impl fmt::Display for Trophy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trophy {
    type Err = YogaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gold" => Ok(Trophy::Gold),
            "silver" => Ok(Trophy::Silver),
            "bronze" => Ok(Trophy::Bronze),
            other => Err(YogaError::Decode(format!("unknown trophy '{other}'"))),
        }
    }
}

/// A completed challenge. Appended to the profile and never edited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub pose_name: String,
    pub trophy: Trophy,
    pub date: DateTime<Utc>,
}

impl Achievement {
    /// Pose name and completion instant together identify an achievement.
    pub fn id(&self) -> String {
        format!("{}@{}", self.pose_name, self.date.to_rfc3339())
    }
}

pub struct AchievementRecorder<P: ?Sized> {
    store: Arc<P>,
}

impl<P: ProfileStore + ?Sized> AchievementRecorder<P> {
    pub fn new(store: Arc<P>) -> Self {
        Self { store }
    }

    /// Score `challenge` held for `held`, append the result to the user's
    /// achievements and add the time to their exercise total, as one write.
    ///
    /// Without a current challenge this does nothing and returns `Ok(None)`.
    pub async fn complete_challenge(
        &self,
        user_id: &str,
        challenge: Option<&Challenge>,
        held: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Achievement>, YogaError> {
        let Some(challenge) = challenge else {
            tracing::debug!("no current challenge; nothing to record");
            return Ok(None);
        };

        let achievement = Achievement {
            pose_name: challenge.name.clone(),
            trophy: Trophy::for_result(challenge.difficulty, held),
            date: now,
        };

        self.store
            .record_completion(user_id, &achievement, held.as_secs())
            .await?;

        crate::observability::record_achievement(achievement.trophy);
        tracing::info!(
            pose = %achievement.pose_name,
            trophy = %achievement.trophy,
            held_secs = held.as_secs(),
            "recorded achievement"
        );
        Ok(Some(achievement))
    }
}
