use crate::clock::{Clock, day_key, day_of};
use crate::daily::{DailyLog, HabitChange};
use crate::errors::StoreError;
use crate::models::{Backup, DayRecord, ImportReport, Session, Settings, Tag, TimerView};
use crate::storage::Repository;
use crate::timer::TimerEngine;
use crate::transfer::Transfer;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

/// Late scheduler fires beyond this are treated as a resume from suspension.
const STALE_TICK_MS: i64 = 2_000;

/// Outcome of a settings edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEdit {
    Saved,
    Duplicate,
    Missing,
}

/// The single writer: timer, day log and import/export over one repository.
pub struct Tracker {
    clock: Arc<dyn Clock>,
    repo: Repository,
    timer: TimerEngine,
    daily: DailyLog,
    transfer: Transfer,
}

impl Tracker {
    /// Builds the tracker and rehydrates any persisted timer.
    pub fn new(clock: Arc<dyn Clock>, repo: Repository, min_session_secs: u64) -> Self {
        let default_tag = repo
            .load_settings()
            .tags
            .first()
            .map(|tag| tag.name.clone())
            .unwrap_or_default();
        let mut timer = TimerEngine::new(clock.clone(), repo.clone(), default_tag)
            .with_min_session_secs(min_session_secs);
        let view = timer.reconcile();
        info!(status = ?view.status, elapsed = view.elapsed, "timer rehydrated");

        Self {
            daily: DailyLog::new(clock.clone(), repo.clone()),
            transfer: Transfer::new(clock.clone(), repo.clone()),
            clock,
            repo,
            timer,
        }
    }

    pub fn today(&self) -> String {
        self.clock.today_key()
    }

    pub fn today_date(&self) -> NaiveDate {
        day_of(self.clock.now_ms())
    }

    pub fn settings(&self) -> Settings {
        self.repo.load_settings()
    }

    pub fn day(&self, date: &str) -> DayRecord {
        self.daily.day(date)
    }

    pub fn timer(&self) -> TimerView {
        self.timer.view()
    }

    pub fn start_timer(&mut self) -> Result<bool, StoreError> {
        self.timer.start()
    }

    /// Called by the scheduler once per second.
    pub fn on_tick(&mut self) -> Result<bool, StoreError> {
        match self.timer.checkpoint_lag_ms() {
            Some(lag) if lag >= STALE_TICK_MS => {
                info!(lag, "scheduler resumed late; reconciling");
                self.timer.reconcile();
                Ok(true)
            }
            Some(_) => self.timer.tick(),
            None => Ok(false),
        }
    }

    pub fn pause_timer(&mut self) -> Result<bool, StoreError> {
        self.settle();
        self.timer.pause()
    }

    /// Stops the timer and files the session, if kept, under today.
    pub fn stop_timer(&mut self) -> Result<Option<Session>, StoreError> {
        self.settle();
        match self.timer.stop()? {
            Some(session) => {
                let date = day_key(session.timestamp);
                Ok(Some(self.daily.append_session(&date, session)?))
            }
            None => Ok(None),
        }
    }

    /// Catches up on seconds the scheduler missed before a transition.
    fn settle(&mut self) {
        if self
            .timer
            .checkpoint_lag_ms()
            .is_some_and(|lag| lag >= STALE_TICK_MS)
        {
            self.timer.reconcile();
        }
    }

    pub fn reconcile_timer(&mut self) -> TimerView {
        self.timer.reconcile()
    }

    /// Only known tags can be selected, and only while idle.
    pub fn select_tag(&mut self, name: &str) -> bool {
        if self.repo.load_settings().tag(name).is_none() {
            return false;
        }
        self.timer.select_tag(name)
    }

    pub fn record_habit(&self, habit_id: &str, delta: i64) -> Result<HabitChange, StoreError> {
        self.daily.record_habit(&self.today(), habit_id, delta)
    }

    pub fn delete_session(&self, date: &str, session_id: i64) -> Result<bool, StoreError> {
        self.daily.delete_session(date, session_id)
    }

    /// Zeroes the day and abandons any running timer.
    pub fn reset_day(&mut self, date: &str) -> Result<DayRecord, StoreError> {
        let record = self.daily.reset_day(date)?;
        self.timer.discard()?;
        Ok(record)
    }

    pub fn add_tag(&self, tag: Tag) -> Result<TagEdit, StoreError> {
        let mut settings = self.repo.load_settings();
        if settings.tag(&tag.name).is_some() {
            return Ok(TagEdit::Duplicate);
        }
        settings.tags.push(tag);
        self.repo.save_settings(&settings)?;
        Ok(TagEdit::Saved)
    }

    /// Renames or recolours a tag. Logged sessions keep their stored values.
    pub fn update_tag(&mut self, old_name: &str, tag: Tag) -> Result<TagEdit, StoreError> {
        let mut settings = self.repo.load_settings();
        if tag.name != old_name && settings.tag(&tag.name).is_some() {
            return Ok(TagEdit::Duplicate);
        }
        let Some(slot) = settings.tags.iter_mut().find(|t| t.name == old_name) else {
            return Ok(TagEdit::Missing);
        };
        let renamed_active = self.timer.tag() == old_name;
        let new_name = tag.name.clone();
        *slot = tag;
        self.repo.save_settings(&settings)?;
        if renamed_active {
            // Takes effect now if idle; otherwise the running session keeps its name.
            self.timer.select_tag(new_name);
        }
        Ok(TagEdit::Saved)
    }

    pub fn replace_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.repo.save_settings(settings)
    }

    pub fn export_all(&self) -> Backup {
        self.transfer.export_all()
    }

    pub fn export_csv(&self) -> String {
        self.transfer.export_csv()
    }

    /// A successful import may have replaced the timer's tag; re-read state.
    pub fn import(&mut self, text: &str) -> Result<ImportReport, StoreError> {
        let report = self.transfer.import(text)?;
        if report.success {
            self.timer.reconcile();
        }
        Ok(report)
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::TimerStatus;

    const T0: i64 = 1_704_067_200_000;

    fn tracker() -> (Arc<ManualClock>, Tracker) {
        let clock = Arc::new(ManualClock::new(T0));
        let tracker = Tracker::new(clock.clone(), Repository::in_memory(), 5);
        (clock, tracker)
    }

    #[test]
    fn late_tick_reconciles_instead_of_counting() {
        let (clock, mut tracker) = tracker();
        tracker.start_timer().unwrap();
        clock.advance_secs(1);
        tracker.on_tick().unwrap();
        clock.advance_secs(90);
        tracker.on_tick().unwrap();
        assert_eq!(tracker.timer().elapsed, 91);

        clock.advance_secs(1);
        tracker.on_tick().unwrap();
        assert_eq!(tracker.timer().elapsed, 92);
    }

    #[test]
    fn stop_after_missed_ticks_counts_wall_time() {
        let (clock, mut tracker) = tracker();
        tracker.start_timer().unwrap();
        clock.advance_secs(42);
        let session = tracker.stop_timer().unwrap().expect("session");
        assert_eq!(session.duration, 42);
        assert_eq!(tracker.day(&tracker.today()).time_logs, vec![session]);
    }

    #[test]
    fn tick_after_pause_is_ignored() {
        let (clock, mut tracker) = tracker();
        tracker.start_timer().unwrap();
        tracker.pause_timer().unwrap();
        clock.advance_secs(1);
        assert!(!tracker.on_tick().unwrap());
        assert_eq!(tracker.timer().elapsed, 0);
    }

    #[test]
    fn reset_day_clears_active_timer() {
        let (_, mut tracker) = tracker();
        tracker.start_timer().unwrap();
        let today = tracker.today();
        tracker.reset_day(&today).unwrap();
        assert_eq!(tracker.timer().status, TimerStatus::Idle);
        assert_eq!(tracker.repository().load_snapshot(), None);
    }

    #[test]
    fn unknown_tags_cannot_be_selected() {
        let (_, mut tracker) = tracker();
        assert!(!tracker.select_tag("Nope"));
        assert!(tracker.select_tag("阅读"));
        assert_eq!(tracker.timer().tag, "阅读");
    }

    #[test]
    fn tag_edits_reject_duplicates() {
        let (_, mut tracker) = tracker();
        let tag = |name: &str| Tag {
            name: name.to_string(),
            color: "rose".to_string(),
        };
        assert_eq!(tracker.add_tag(tag("学习")).unwrap(), TagEdit::Duplicate);
        assert_eq!(tracker.add_tag(tag("Piano")).unwrap(), TagEdit::Saved);
        assert_eq!(tracker.update_tag("Piano", tag("阅读")).unwrap(), TagEdit::Duplicate);
        assert_eq!(tracker.update_tag("Ghost", tag("Ghost2")).unwrap(), TagEdit::Missing);

        assert_eq!(tracker.update_tag("工作", tag("Work")).unwrap(), TagEdit::Saved);
        assert_eq!(tracker.timer().tag, "Work");
        assert_eq!(tracker.settings().tags[0].color, "rose");
    }

    #[test]
    fn session_keeps_colour_when_tag_is_renamed_mid_run() {
        let (clock, mut tracker) = tracker();
        tracker.start_timer().unwrap();
        clock.advance_secs(60);
        let work = Tag {
            name: "Work".to_string(),
            color: "orange".to_string(),
        };
        assert_eq!(tracker.update_tag("工作", work).unwrap(), TagEdit::Saved);

        let session = tracker.stop_timer().unwrap().expect("session");
        assert_eq!(session.name, "工作");
        assert_eq!(session.color.as_deref(), Some("blue"));
    }

    #[test]
    fn captured_colour_survives_a_restart() {
        let clock = Arc::new(ManualClock::new(T0));
        let repo = Repository::in_memory();
        let mut first = Tracker::new(clock.clone(), repo.clone(), 5);
        first.start_timer().unwrap();
        let recolour = Tag {
            name: "工作".to_string(),
            color: "stone".to_string(),
        };
        first.update_tag("工作", recolour).unwrap();
        clock.advance_secs(30);

        let mut second = Tracker::new(clock, repo, 5);
        let session = second.stop_timer().unwrap().expect("session");
        assert_eq!(session.duration, 30);
        assert_eq!(session.color.as_deref(), Some("blue"));
    }
}
