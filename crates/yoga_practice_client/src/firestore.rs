//! Firestore REST document encoding for user profiles.
//!
//! Firestore wraps every field in a typed value object
//! (`{"stringValue": "..."}`, `{"integerValue": "42"}`, ...). Decoding is
//! strict: a field with the wrong type, or an achievement missing one of
//! `poseName`, `trophy`, `date`, is a [`YogaError::Decode`]. Only absent
//! fields fall back to defaults (`fullName` → empty, `achievements` → none,
//! `exerciseDuration` → 0).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::YogaError;
use crate::achievement::{Achievement, Trophy};
use crate::profile::{ProfileUpdate, UserProfile};

pub const FULL_NAME: &str = "fullName";
pub const PROFILE_PIC_URL: &str = "profilePicUrl";
pub const EXERCISE_DURATION: &str = "exerciseDuration";
pub const ACHIEVEMENTS: &str = "achievements";

const POSE_NAME: &str = "poseName";
const TROPHY: &str = "trophy";
const DATE: &str = "date";

pub fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

pub fn integer_value(n: u64) -> Value {
    // Firestore transports 64-bit integers as decimal strings.
    json!({ "integerValue": n.to_string() })
}

pub fn timestamp_value(ts: DateTime<Utc>) -> Value {
    json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

pub fn map_value(fields: Map<String, Value>) -> Value {
    json!({ "mapValue": { "fields": fields } })
}

pub fn array_value(values: Vec<Value>) -> Value {
    json!({ "arrayValue": { "values": values } })
}

pub fn encode_achievement(a: &Achievement) -> Value {
    let mut fields = Map::new();
    fields.insert(POSE_NAME.into(), string_value(&a.pose_name));
    fields.insert(TROPHY.into(), string_value(a.trophy.as_str()));
    fields.insert(DATE.into(), timestamp_value(a.date));
    map_value(fields)
}

/// Full document body for a create or replace.
pub fn encode_profile(p: &UserProfile) -> Value {
    let mut fields = Map::new();
    fields.insert(FULL_NAME.into(), string_value(&p.full_name));
    if let Some(url) = &p.profile_pic_url {
        fields.insert(PROFILE_PIC_URL.into(), string_value(url));
    }
    fields.insert(EXERCISE_DURATION.into(), integer_value(p.exercise_duration));
    fields.insert(
        ACHIEVEMENTS.into(),
        array_value(p.achievements.iter().map(encode_achievement).collect()),
    );
    json!({ "fields": fields })
}

/// Document body plus the field paths it touches, for a masked merge write.
pub fn encode_update(u: &ProfileUpdate) -> (Value, Vec<&'static str>) {
    let mut fields = Map::new();
    let mut mask = Vec::new();
    if let Some(name) = &u.full_name {
        fields.insert(FULL_NAME.into(), string_value(name));
        mask.push(FULL_NAME);
    }
    if let Some(url) = &u.profile_pic_url {
        fields.insert(PROFILE_PIC_URL.into(), string_value(url));
        mask.push(PROFILE_PIC_URL);
    }
    if let Some(d) = u.exercise_duration {
        fields.insert(EXERCISE_DURATION.into(), integer_value(d));
        mask.push(EXERCISE_DURATION);
    }
    (json!({ "fields": fields }), mask)
}

pub fn decode_profile(doc: &Value) -> Result<UserProfile, YogaError> {
    let empty = Map::new();
    let fields = match doc.get("fields") {
        None => &empty,
        Some(Value::Object(map)) => map,
        Some(other) => return Err(decode_err("fields", "an object", other)),
    };

    let achievements = match fields.get(ACHIEVEMENTS) {
        None => Vec::new(),
        Some(v) => as_array(ACHIEVEMENTS, v)?
            .iter()
            .enumerate()
            .map(|(i, item)| decode_achievement(i, item))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(UserProfile {
        full_name: fields
            .get(FULL_NAME)
            .map(|v| as_string(FULL_NAME, v))
            .transpose()?
            .unwrap_or_default(),
        profile_pic_url: fields
            .get(PROFILE_PIC_URL)
            .map(|v| as_optional_string(PROFILE_PIC_URL, v))
            .transpose()?
            .flatten(),
        exercise_duration: fields
            .get(EXERCISE_DURATION)
            .map(|v| as_duration(EXERCISE_DURATION, v))
            .transpose()?
            .unwrap_or(0),
        achievements,
    })
}

fn decode_achievement(index: usize, v: &Value) -> Result<Achievement, YogaError> {
    let at = |field: &str| format!("{ACHIEVEMENTS}[{index}].{field}");
    let fields = v
        .get("mapValue")
        .and_then(|m| m.get("fields"))
        .and_then(Value::as_object)
        .ok_or_else(|| decode_err(&format!("{ACHIEVEMENTS}[{index}]"), "a map", v))?;
    let require = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| YogaError::Decode(format!("{} is missing", at(name))))
    };

    let pose_name = as_string(&at(POSE_NAME), require(POSE_NAME)?)?;
    let trophy: Trophy = as_string(&at(TROPHY), require(TROPHY)?)?.parse()?;
    let date = as_timestamp(&at(DATE), require(DATE)?)?;
    Ok(Achievement {
        pose_name,
        trophy,
        date,
    })
}

fn decode_err(field: &str, expected: &str, got: &Value) -> YogaError {
    let shown: String = got.to_string().chars().take(128).collect();
    YogaError::Decode(format!("{field}: expected {expected}, got {shown}"))
}

fn as_string(field: &str, v: &Value) -> Result<String, YogaError> {
    v.get("stringValue")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| decode_err(field, "stringValue", v))
}

fn as_optional_string(field: &str, v: &Value) -> Result<Option<String>, YogaError> {
    if v.get("nullValue").is_some() {
        return Ok(None);
    }
    as_string(field, v).map(Some)
}

/// Non-negative integer seconds. Older clients wrote a double.
fn as_duration(field: &str, v: &Value) -> Result<u64, YogaError> {
    if let Some(raw) = v.get("integerValue") {
        let parsed = match raw {
            Value::String(s) => s.parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        return parsed.ok_or_else(|| decode_err(field, "a non-negative integer", v));
    }
    if let Some(d) = v.get("doubleValue").and_then(Value::as_f64) {
        if d.is_finite() && d >= 0.0 {
            return Ok(d.round() as u64);
        }
    }
    Err(decode_err(field, "integerValue", v))
}

fn as_timestamp(field: &str, v: &Value) -> Result<DateTime<Utc>, YogaError> {
    v.get("timestampValue")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| decode_err(field, "timestampValue", v))
}

fn as_array<'a>(field: &str, v: &'a Value) -> Result<&'a [Value], YogaError> {
    let arr = v
        .get("arrayValue")
        .ok_or_else(|| decode_err(field, "arrayValue", v))?;
    // An empty array is sent as `{"arrayValue": {}}`.
    match arr.get("values") {
        None => Ok(&[]),
        Some(Value::Array(values)) => Ok(values),
        Some(other) => Err(decode_err(field, "a list of values", other)),
    }
}
