//! Focus timer state machine.
//!
//! ```text
//! Idle -> Running <-> Paused -> Idle
//! ```
//!
//! Every transition and tick writes a [`TimerSnapshot`]; the snapshot exists
//! exactly while the timer is running or paused. Elapsed time after any gap in
//! ticking (suspended page, sleeping machine, restart) is recovered by
//! [`TimerEngine::reconcile`] from the snapshot's `lastTick`, never by counting
//! ticks.

use crate::clock::Clock;
use crate::errors::StoreError;
use crate::models::{Session, TimerSnapshot, TimerStatus, TimerView};
use crate::storage::Repository;
use std::sync::Arc;
use tracing::{debug, info};

/// Sessions at or below this many seconds are discarded on stop.
pub const DEFAULT_MIN_SESSION_SECS: u64 = 5;

pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    repo: Repository,
    status: TimerStatus,
    elapsed: u64,
    last_tick: i64,
    tag: String,
    color: Option<String>,
    min_session_secs: u64,
}

impl TimerEngine {
    pub fn new(clock: Arc<dyn Clock>, repo: Repository, tag: impl Into<String>) -> Self {
        let last_tick = clock.now_ms();
        Self {
            clock,
            repo,
            status: TimerStatus::Idle,
            elapsed: 0,
            last_tick,
            tag: tag.into(),
            color: None,
            min_session_secs: DEFAULT_MIN_SESSION_SECS,
        }
    }

    pub fn with_min_session_secs(mut self, secs: u64) -> Self {
        self.min_session_secs = secs;
        self
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn view(&self) -> TimerView {
        TimerView {
            status: self.status,
            elapsed: self.elapsed,
            tag: self.tag.clone(),
        }
    }

    /// Milliseconds since the last checkpoint while running.
    pub fn checkpoint_lag_ms(&self) -> Option<i64> {
        (self.status == TimerStatus::Running).then(|| self.clock.now_ms() - self.last_tick)
    }

    /// Categories can only change between sessions.
    pub fn select_tag(&mut self, tag: impl Into<String>) -> bool {
        if self.status != TimerStatus::Idle {
            return false;
        }
        self.tag = tag.into();
        true
    }

    pub fn start(&mut self) -> Result<bool, StoreError> {
        if self.status == TimerStatus::Running {
            return Ok(false);
        }
        if self.status == TimerStatus::Idle {
            self.color = self.lookup_color(&self.tag);
        }
        self.status = TimerStatus::Running;
        self.checkpoint()?;
        info!(tag = %self.tag, elapsed = self.elapsed, "timer started");
        Ok(true)
    }

    pub fn tick(&mut self) -> Result<bool, StoreError> {
        if self.status != TimerStatus::Running {
            return Ok(false);
        }
        self.elapsed += 1;
        self.checkpoint()?;
        Ok(true)
    }

    pub fn pause(&mut self) -> Result<bool, StoreError> {
        if self.status != TimerStatus::Running {
            return Ok(false);
        }
        self.status = TimerStatus::Paused;
        self.checkpoint()?;
        info!(tag = %self.tag, elapsed = self.elapsed, "timer paused");
        Ok(true)
    }

    /// Ends the lifecycle. Returns the finished session when it is long enough
    /// to keep; the caller is responsible for recording it.
    pub fn stop(&mut self) -> Result<Option<Session>, StoreError> {
        if self.status == TimerStatus::Idle {
            return Ok(None);
        }

        let now = self.clock.now_ms();
        let elapsed = self.elapsed;
        self.status = TimerStatus::Idle;
        self.elapsed = 0;
        self.last_tick = now;
        self.repo.clear_snapshot()?;
        let color = self.color.take();

        if elapsed <= self.min_session_secs {
            info!(elapsed, "timer stopped; session too short to keep");
            return Ok(None);
        }

        info!(tag = %self.tag, elapsed, "timer stopped");
        Ok(Some(Session {
            id: now,
            name: self.tag.clone(),
            color,
            duration: elapsed,
            timestamp: now,
        }))
    }

    /// Rebuilds in-memory state from the persisted snapshot.
    ///
    /// A running snapshot gains the whole seconds between its `lastTick` and
    /// now; a paused one is restored verbatim. No snapshot means idle. Nothing
    /// is written, so calling this repeatedly is harmless.
    pub fn reconcile(&mut self) -> TimerView {
        match self.repo.load_snapshot() {
            None => {
                self.status = TimerStatus::Idle;
                self.elapsed = 0;
                self.color = None;
            }
            Some(snapshot) => {
                let drift = match snapshot.status {
                    TimerStatus::Running => (self.clock.now_ms() - snapshot.last_tick).max(0) / 1000,
                    TimerStatus::Paused | TimerStatus::Idle => 0,
                };
                if drift > 0 {
                    debug!(drift, "applying drift to running timer");
                }
                self.color = snapshot
                    .color
                    .or_else(|| self.lookup_color(&snapshot.tag));
                self.tag = snapshot.tag;
                self.status = snapshot.status;
                self.elapsed = snapshot.elapsed + drift as u64;
                // The instant `elapsed` is exact for; sub-second remainder stays pending.
                self.last_tick = snapshot.last_tick + drift * 1000;
            }
        }
        self.view()
    }

    /// Drops any in-progress timer without producing a session.
    pub fn discard(&mut self) -> Result<(), StoreError> {
        self.status = TimerStatus::Idle;
        self.elapsed = 0;
        self.color = None;
        self.repo.clear_snapshot()
    }

    fn checkpoint(&mut self) -> Result<(), StoreError> {
        self.last_tick = self.clock.now_ms();
        self.repo.save_snapshot(&TimerSnapshot {
            status: self.status,
            elapsed: self.elapsed,
            last_tick: self.last_tick,
            tag: self.tag.clone(),
            color: self.color.clone(),
        })
    }

    fn lookup_color(&self, tag: &str) -> Option<String> {
        self.repo
            .load_settings()
            .tag(tag)
            .map(|tag| tag.color.clone())
    }
}
