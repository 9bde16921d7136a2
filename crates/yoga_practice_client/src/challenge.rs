//! The daily pose challenge.
//!
//! One challenge is drawn per calendar day and pinned in local storage, so
//! every load on the same day returns the same pose.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::YogaError;
use crate::kv_store::{CURRENT_CHALLENGE_KEY, KeyValueStore, LAST_UPDATED_KEY};
use crate::utils::{calendar_day, is_same_day, parse_timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: u32,
    pub name: String,
    /// 1 (easy) to 3 (hard).
    pub difficulty: u8,
}

impl Challenge {
    pub fn new(id: u32, name: impl Into<String>, difficulty: u8) -> Self {
        Self {
            id,
            name: name.into(),
            difficulty,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChallengeCatalog {
    challenges: Vec<Challenge>,
}

impl ChallengeCatalog {
    /// Build a catalog, rejecting duplicate ids and difficulties outside 1..=3.
    pub fn new(challenges: Vec<Challenge>) -> Result<Self, YogaError> {
        let mut seen = HashSet::new();
        for c in &challenges {
            if !(1..=3).contains(&c.difficulty) {
                return Err(YogaError::InvalidInput(format!(
                    "challenge {} has difficulty {}",
                    c.id, c.difficulty
                )));
            }
            if !seen.insert(c.id) {
                return Err(YogaError::InvalidInput(format!(
                    "duplicate challenge id {}",
                    c.id
                )));
            }
        }
        Ok(Self { challenges })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter()
    }
}

/// The built-in pose list.
pub fn default_catalog() -> ChallengeCatalog {
    let poses: [(&str, u8); 15] = [
        ("Mountain Pose", 1),
        ("Child's Pose", 1),
        ("Downward Dog", 1),
        ("Cobra Pose", 1),
        ("Tree Pose", 1),
        ("Warrior I", 2),
        ("Warrior II", 2),
        ("Triangle Pose", 2),
        ("Chair Pose", 2),
        ("Bridge Pose", 2),
        ("Boat Pose", 3),
        ("Crow Pose", 3),
        ("Side Plank", 3),
        ("Wheel Pose", 3),
        ("Headstand", 3),
    ];
    let challenges = poses
        .iter()
        .enumerate()
        .map(|(i, (name, difficulty))| Challenge::new(i as u32 + 1, *name, *difficulty))
        .collect();
    ChallengeCatalog { challenges }
}

fn random_index(len: usize) -> usize {
    rand::random_range(0..len)
}

pub struct ChallengeSelector<S> {
    store: S,
    catalog: ChallengeCatalog,
    offset: FixedOffset,
    pick: fn(usize) -> usize,
}

impl<S: KeyValueStore> ChallengeSelector<S> {
    pub fn new(store: S, catalog: ChallengeCatalog) -> Self {
        Self {
            store,
            catalog,
            offset: Utc.fix(),
            pick: random_index,
        }
    }

    /// Calendar days are judged in `offset`.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Replace the uniform random pick; `pick(len)` must return an index below `len`.
    pub fn with_picker(mut self, pick: fn(usize) -> usize) -> Self {
        self.pick = pick;
        self
    }

    pub fn catalog(&self) -> &ChallengeCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_challenge(&self) -> Result<Option<Challenge>, YogaError> {
        self.load_challenge_at(Utc::now())
    }

    /// Today's challenge as of `now`. Draws and persists a new one when the
    /// stored selection is from another day, missing, or no longer in the
    /// catalog. An empty catalog yields `None`.
    pub fn load_challenge_at(&self, now: DateTime<Utc>) -> Result<Option<Challenge>, YogaError> {
        let today = calendar_day(now, self.offset);

        if let Some(last) = self.last_updated()? {
            if is_same_day(last, now, self.offset) {
                if let Some(id) = self.current_id()? {
                    if let Some(c) = self.catalog.get(id) {
                        return Ok(Some(c.clone()));
                    }
                    tracing::warn!(id, "stored challenge no longer in catalog; drawing again");
                }
            }
        }

        if self.catalog.is_empty() {
            tracing::debug!("challenge catalog is empty");
            return Ok(None);
        }

        let idx = (self.pick)(self.catalog.len()).min(self.catalog.len() - 1);
        let chosen = self.catalog.challenges[idx].clone();
        self.store.set(CURRENT_CHALLENGE_KEY, Value::from(chosen.id))?;
        self.store
            .set(LAST_UPDATED_KEY, Value::from(now.to_rfc3339()))?;
        crate::observability::record_challenge_rollover();
        tracing::info!(id = chosen.id, name = %chosen.name, %today, "selected daily challenge");
        Ok(Some(chosen))
    }

    fn last_updated(&self) -> Result<Option<DateTime<Utc>>, YogaError> {
        match self.store.get(LAST_UPDATED_KEY)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => parse_timestamp(&s).map(Some).ok_or_else(|| {
                YogaError::Decode(format!("{LAST_UPDATED_KEY} is not a date: {s}"))
            }),
            Some(other) => Err(YogaError::Decode(format!(
                "{LAST_UPDATED_KEY} has unexpected value {other}"
            ))),
        }
    }

    /// The id is accepted as a JSON integer or a numeric string.
    fn current_id(&self) -> Result<Option<u32>, YogaError> {
        let bad = |v: &Value| YogaError::Decode(format!("{CURRENT_CHALLENGE_KEY} is invalid: {v}"));
        match self.store.get(CURRENT_CHALLENGE_KEY)? {
            None | Some(Value::Null) => Ok(None),
            Some(v @ Value::Number(_)) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| bad(&v)),
            Some(v @ Value::String(_)) => v
                .as_str()
                .and_then(|s| s.parse::<u32>().ok())
                .map(Some)
                .ok_or_else(|| bad(&v)),
            Some(v) => Err(bad(&v)),
        }
    }
}
