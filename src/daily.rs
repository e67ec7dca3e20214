use crate::clock::Clock;
use crate::errors::StoreError;
use crate::models::{DayRecord, Session};
use crate::storage::Repository;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-day habit counters and session log.
///
/// Every mutation is read-modify-write of the whole [`DayRecord`] and stamps
/// `lastUpdate`.
#[derive(Clone)]
pub struct DailyLog {
    clock: Arc<dyn Clock>,
    repo: Repository,
}

/// Result of a habit change: whether it was applied and the resulting count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitChange {
    pub applied: bool,
    pub count: u32,
}

impl DailyLog {
    pub fn new(clock: Arc<dyn Clock>, repo: Repository) -> Self {
        Self { clock, repo }
    }

    pub fn day(&self, date: &str) -> DayRecord {
        self.repo.load_day(date)
    }

    /// Unknown habits and changes past a bounded maximum are not written.
    pub fn record_habit(
        &self,
        date: &str,
        habit_id: &str,
        delta: i64,
    ) -> Result<HabitChange, StoreError> {
        let mut record = self.repo.load_day(date);
        let current = record.count(habit_id);
        let settings = self.repo.load_settings();
        let Some(habit) = settings.habit(habit_id) else {
            debug!(habit_id, "ignoring change to unknown habit");
            return Ok(HabitChange {
                applied: false,
                count: current,
            });
        };

        let Some(next) = habit.kind().apply_delta(current, delta) else {
            debug!(habit_id, current, delta, "habit change exceeds maximum");
            return Ok(HabitChange {
                applied: false,
                count: current,
            });
        };

        record.habits.insert(habit_id.to_string(), next);
        self.write(date, record)?;
        Ok(HabitChange {
            applied: true,
            count: next,
        })
    }

    /// Appends to the day's log. A clashing id is bumped until unique.
    pub fn append_session(&self, date: &str, mut session: Session) -> Result<Session, StoreError> {
        let mut record = self.repo.load_day(date);
        while record.time_logs.iter().any(|log| log.id == session.id) {
            session.id += 1;
        }
        record.time_logs.push(session.clone());
        self.write(date, record)?;
        info!(%date, name = %session.name, duration = session.duration, "session logged");
        Ok(session)
    }

    pub fn delete_session(&self, date: &str, session_id: i64) -> Result<bool, StoreError> {
        let mut record = self.repo.load_day(date);
        let before = record.time_logs.len();
        record.time_logs.retain(|log| log.id != session_id);
        if record.time_logs.len() == before {
            return Ok(false);
        }
        self.write(date, record)?;
        info!(%date, session_id, "session deleted");
        Ok(true)
    }

    /// Zeroes every configured habit and empties the session log. Clearing the
    /// active timer is the caller's half of a reset.
    pub fn reset_day(&self, date: &str) -> Result<DayRecord, StoreError> {
        let settings = self.repo.load_settings();
        let mut record = DayRecord::default();
        for habit in &settings.habits {
            record.habits.insert(habit.id.clone(), 0);
        }
        let record = self.write(date, record)?;
        info!(%date, "day reset");
        Ok(record)
    }

    fn write(&self, date: &str, mut record: DayRecord) -> Result<DayRecord, StoreError> {
        record.last_update = Some(self.clock.now_ms());
        self.repo.save_day(date, &record)?;
        Ok(record)
    }
}
