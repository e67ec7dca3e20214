//! Backup export and merge-on-import.
//!
//! Imports overwrite whole days that appear in the payload and leave every
//! other stored day alone. A payload that yields nothing usable leaves the
//! store untouched.

use crate::clock::{Clock, iso_timestamp, parse_day_key};
use crate::errors::StoreError;
use crate::migrate::{normalize_days, normalize_settings};
use crate::models::{Backup, ImportKind, ImportReport, Session};
use crate::storage::Repository;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the placeholder session synthesised from a CSV focus column.
pub const LEGACY_SESSION_NAME: &str = "历史导入数据";

const BOM: char = '\u{feff}';
const NOON_MS: i64 = 12 * 3_600_000;

#[derive(Clone)]
pub struct Transfer {
    clock: Arc<dyn Clock>,
    repo: Repository,
}

impl Transfer {
    pub fn new(clock: Arc<dyn Clock>, repo: Repository) -> Self {
        Self { clock, repo }
    }

    pub fn export_all(&self) -> Backup {
        Backup {
            logs: self.repo.load_days(),
            settings: self.repo.load_settings(),
            backup_date: iso_timestamp(self.clock.now_ms()),
        }
    }

    /// Spreadsheet report, newest day first, prefixed with a UTF-8 BOM.
    pub fn export_csv(&self) -> String {
        let settings = self.repo.load_settings();
        let days = self.repo.load_days();

        let mut out = String::new();
        out.push(BOM);
        out.push_str("date");
        for habit in &settings.habits {
            out.push(',');
            out.push_str(&csv_field(&habit.label));
        }
        out.push_str(",focus_minutes,details\n");

        for (date, day) in days.iter().rev() {
            out.push_str(date);
            for habit in &settings.habits {
                let _ = write!(out, ",{}", day.count(&habit.id));
            }
            let details = day
                .sessions_chronological()
                .iter()
                .map(|log| format!("{}({}m)", log.name, (log.duration as f64 / 60.0).round()))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = writeln!(
                out,
                ",{:.1},{}",
                day.focus_secs() as f64 / 60.0,
                quote(&details)
            );
        }
        out
    }

    /// Accepts either a JSON backup or a CSV report.
    pub fn import(&self, text: &str) -> Result<ImportReport, StoreError> {
        let trimmed = text.trim_start_matches(BOM).trim_start();
        if trimmed.starts_with('{') {
            self.import_json(trimmed)
        } else {
            self.import_csv(trimmed)
        }
    }

    pub fn import_json(&self, text: &str) -> Result<ImportReport, StoreError> {
        let Ok(Value::Object(mut payload)) = serde_json::from_str::<Value>(text) else {
            warn!("import payload is not a JSON object");
            return Ok(ImportReport::failed());
        };

        let records = payload
            .remove("logs")
            .or_else(|| payload.remove("records"))
            .filter(Value::is_object);
        let settings = payload.remove("settings").filter(Value::is_object);
        if records.is_none() && settings.is_none() {
            warn!("import payload has neither records nor settings");
            return Ok(ImportReport::failed());
        }

        let mut count = 0;
        if let Some(records) = records {
            let imported = normalize_days(records);
            count = imported.len();
            let mut days = self.repo.load_days();
            days.extend(imported);
            self.repo.save_days(&days)?;
        }
        if let Some(settings) = settings {
            self.repo.save_settings(&normalize_settings(settings))?;
        }

        info!(count, "imported JSON backup");
        Ok(ImportReport::succeeded(ImportKind::Json, count))
    }

    /// Column 0 is the date, then one column per configured habit, then an
    /// optional focus-minutes column. The header row is skipped.
    ///
    /// Existing sessions are kept, so re-importing an exported report into the
    /// same store counts that day's focus time twice.
    pub fn import_csv(&self, text: &str) -> Result<ImportReport, StoreError> {
        let settings = self.repo.load_settings();
        let legacy_column = settings.habits.len() + 1;
        let now = self.clock.now_ms();
        let mut days = self.repo.load_days();
        let mut count = 0;

        for (row, line) in text.trim_start_matches(BOM).lines().enumerate().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split(',').collect();
            let date = cols[0].trim();
            let Some(day) = parse_day_key(date) else {
                debug!(row, "skipping CSV row without a valid date");
                continue;
            };

            let record = days.entry(date.to_string()).or_default();
            for (index, habit) in settings.habits.iter().enumerate() {
                let value = cols.get(index + 1).map_or(0, |col| leading_int(col));
                record.habits.insert(habit.id.clone(), value);
            }

            let minutes = cols
                .get(legacy_column)
                .and_then(|col| col.trim().parse::<f64>().ok())
                .filter(|minutes| minutes.is_finite() && *minutes > 0.0);
            let has_placeholder = record
                .time_logs
                .iter()
                .any(|log| log.name == LEGACY_SESSION_NAME);
            if let (Some(minutes), false) = (minutes, has_placeholder) {
                let midnight = day
                    .and_hms_opt(0, 0, 0)
                    .map(|start| start.and_utc().timestamp_millis())
                    .unwrap_or_default();
                record.time_logs.push(Session {
                    id: now + row as i64,
                    name: LEGACY_SESSION_NAME.to_string(),
                    color: None,
                    duration: (minutes * 60.0).floor() as u64,
                    timestamp: midnight + NOON_MS,
                });
            }
            record.last_update = Some(now);
            count += 1;
        }

        if count == 0 {
            warn!("CSV import found no usable rows");
            return Ok(ImportReport::failed());
        }
        self.repo.save_days(&days)?;
        info!(count, "imported CSV rows");
        Ok(ImportReport::succeeded(ImportKind::Csv, count))
    }
}

/// Integer prefix of a cell; blanks, junk and negatives read as zero.
fn leading_int(cell: &str) -> u32 {
    let cell = cell.trim().trim_matches('"');
    let digits: String = cell.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        quote(value)
    } else {
        value.to_string()
    }
}
