//! Schema normalisation for stored and imported documents.
//!
//! Every read goes through these functions: raw JSON in, current-schema value
//! out. Nothing here touches storage, so older layouts (string tag lists,
//! float counters, records without `timeLogs`) are upgraded in one place.

use crate::clock::parse_day_key;
use crate::habits::{TAG_PALETTE, default_habits, default_tags};
use crate::models::{DayRecord, HabitDef, Session, Settings, Tag, TimerSnapshot, TimerStatus};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

const RESERVED_DAY_FIELDS: [&str; 2] = ["timeLogs", "lastUpdate"];

pub fn normalize_days(raw: Value) -> BTreeMap<String, DayRecord> {
    let Value::Object(entries) = raw else {
        warn!("day records document is not an object; ignoring it");
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(date, day)| {
            if parse_day_key(&date).is_none() {
                warn!(%date, "skipping record with malformed day key");
                return None;
            }
            Some((date, normalize_day(day)))
        })
        .collect()
}

pub fn normalize_day(raw: Value) -> DayRecord {
    let Value::Object(fields) = raw else {
        return DayRecord::default();
    };

    let mut record = DayRecord::default();
    for (key, value) in &fields {
        if RESERVED_DAY_FIELDS.contains(&key.as_str()) {
            continue;
        }
        if let Some(count) = as_count(value) {
            record.habits.insert(key.clone(), count);
        }
    }
    record.last_update = fields.get("lastUpdate").and_then(as_millis);
    if let Some(Value::Array(logs)) = fields.get("timeLogs") {
        record.time_logs = logs.iter().filter_map(normalize_session).collect();
    }
    record
}

fn normalize_session(raw: &Value) -> Option<Session> {
    let fields = raw.as_object()?;
    let duration = fields.get("duration").and_then(as_count_u64)?;
    let timestamp = fields.get("timestamp").and_then(as_millis)?;
    let id = fields.get("id").and_then(as_millis).unwrap_or(timestamp);
    let name = fields
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let color = fields
        .get("color")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(Session {
        id,
        name,
        color,
        duration,
        timestamp,
    })
}

pub fn normalize_settings(raw: Value) -> Settings {
    let Value::Object(fields) = raw else {
        return Settings::default();
    };

    let mut tags = match fields.get("tags") {
        Some(Value::Array(items)) => normalize_tags(items),
        _ => Vec::new(),
    };
    if tags.is_empty() {
        tags = default_tags();
    }

    let mut habits: Vec<HabitDef> = match fields.get("habits") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };
    if habits.is_empty() {
        habits = default_habits();
    }

    Settings { tags, habits }
}

/// Accepts both the legacy `["Work", ...]` list and `[{name, color}, ...]`.
fn normalize_tags(items: &[Value]) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let palette = TAG_PALETTE[index % TAG_PALETTE.len()];
        let tag = match item {
            Value::String(name) => Tag {
                name: name.clone(),
                color: palette.to_string(),
            },
            Value::Object(fields) => {
                let Some(name) = fields.get("name").and_then(Value::as_str) else {
                    continue;
                };
                Tag {
                    name: name.to_string(),
                    color: fields
                        .get("color")
                        .and_then(Value::as_str)
                        .unwrap_or(palette)
                        .to_string(),
                }
            }
            _ => continue,
        };
        if tag.name.trim().is_empty() || tags.iter().any(|t| t.name == tag.name) {
            continue;
        }
        tags.push(tag);
    }
    tags
}

/// An idle snapshot is the same as no snapshot.
pub fn normalize_snapshot(raw: Value) -> Option<TimerSnapshot> {
    let snapshot: TimerSnapshot = match serde_json::from_value(raw) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!("discarding unreadable timer snapshot: {err}");
            return None;
        }
    };
    match snapshot.status {
        TimerStatus::Idle => None,
        TimerStatus::Running | TimerStatus::Paused => Some(snapshot),
    }
}

/// Parses bytes leniently; corrupt input becomes `Value::Null`.
pub fn parse_raw(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        warn!("stored document is not valid JSON: {err}");
        Value::Null
    })
}

fn as_count(value: &Value) -> Option<u32> {
    as_count_u64(value).map(|count| count.min(u64::from(u32::MAX)) as u32)
}

fn as_count_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                Some(n)
            } else if let Some(n) = number.as_i64() {
                Some(n.max(0) as u64)
            } else {
                number.as_f64().map(|f| f.max(0.0).floor() as u64)
            }
        }
        _ => None,
    }
}

fn as_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    }
}
