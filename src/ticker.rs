use crate::tracker::Tracker;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// The once-per-second driver for a running timer. At most one task is ever
/// live: arming always aborts the previous one first.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Ticks `tracker` every period until the timer leaves `Running`.
    pub fn arm(&mut self, tracker: Arc<Mutex<Tracker>>) {
        self.cancel();
        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            // Missed fires are recovered by reconciliation, not by bursting.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let mut guard = tracker.lock().await;
                match guard.on_tick() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => error!("failed to checkpoint timer: {err}"),
                }
            }
            debug!("ticker finished");
        }));
        debug!("ticker armed");
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("ticker cancelled");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
