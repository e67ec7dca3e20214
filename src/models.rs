use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One calendar day, keyed externally by its `YYYY-MM-DD` string.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DayRecord {
    #[serde(flatten)]
    pub habits: BTreeMap<String, u32>,
    #[serde(rename = "timeLogs", default)]
    pub time_logs: Vec<Session>,
    #[serde(rename = "lastUpdate", default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
}

impl DayRecord {
    pub fn count(&self, habit_id: &str) -> u32 {
        self.habits.get(habit_id).copied().unwrap_or(0)
    }

    pub fn focus_secs(&self) -> u64 {
        self.time_logs.iter().map(|log| log.duration).sum()
    }

    /// Sessions ordered by end instant, oldest first.
    pub fn sessions_chronological(&self) -> Vec<Session> {
        let mut logs = self.time_logs.clone();
        logs.sort_by_key(|log| log.timestamp);
        logs
    }
}

/// A finished focus interval. `timestamp` is the end instant in epoch ms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub duration: u64,
    pub timestamp: i64,
}

impl Session {
    pub fn started_at(&self) -> i64 {
        self.timestamp - (self.duration as i64) * 1000
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub elapsed: u64,
    pub last_tick: i64,
    pub tag: String,
    /// Tag colour captured when the session began.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CountingMode {
    /// Capped at `max`.
    Count,
    /// `max` is a display target only.
    Infinite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitDef {
    pub id: String,
    pub label: String,
    pub max: u32,
    #[serde(rename = "type")]
    pub mode: CountingMode,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub tags: Vec<Tag>,
    pub habits: Vec<HabitDef>,
}

impl Settings {
    pub fn habit(&self, id: &str) -> Option<&HabitDef> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.name == name)
    }
}

/// Full backup document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub logs: BTreeMap<String, DayRecord>,
    pub settings: Settings,
    pub backup_date: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportKind {
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ImportKind>,
    pub count: usize,
}

impl ImportReport {
    pub fn failed() -> Self {
        Self {
            success: false,
            kind: None,
            count: 0,
        }
    }

    pub fn succeeded(kind: ImportKind, count: usize) -> Self {
        Self {
            success: true,
            kind: Some(kind),
            count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerView {
    pub status: TimerStatus,
    pub elapsed: u64,
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct HabitRequest {
    #[serde(default = "default_delta")]
    pub delta: i64,
}

fn default_delta() -> i64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HabitResponse {
    pub date: String,
    pub habit: String,
    pub applied: bool,
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct TagSelectRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub timer: TimerView,
    pub session: Option<Session>,
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub date: String,
    pub record: DayRecord,
    pub timer: TimerView,
    pub settings: Settings,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HabitTotal {
    pub id: String,
    pub label: String,
    pub total: u64,
    pub target: u64,
    pub rate: u8,
    pub avg: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub range: u32,
    pub days_logged: u32,
    pub habits: Vec<HabitTotal>,
    pub total_focus_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub level: u8,
    pub focus_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalendarResponse {
    pub month: String,
    pub days: Vec<CalendarDay>,
}
