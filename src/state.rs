use crate::models::TimerStatus;
use crate::ticker::Ticker;
use crate::tracker::Tracker;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Mutex<Tracker>>,
    pub ticker: Arc<Mutex<Ticker>>,
}

impl AppState {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            ticker: Arc::new(Mutex::new(Ticker::default())),
        }
    }

    /// Keeps exactly one ticker alive while the timer runs and none otherwise.
    ///
    /// The status is read under the ticker lock, so concurrent callers settle
    /// on the timer's latest state. Must be called without the tracker lock held.
    pub async fn sync_ticker(&self) {
        let mut ticker = self.ticker.lock().await;
        let status = self.tracker.lock().await.timer().status;
        match status {
            TimerStatus::Running if !ticker.is_armed() => ticker.arm(Arc::clone(&self.tracker)),
            TimerStatus::Running => {}
            TimerStatus::Paused | TimerStatus::Idle => ticker.cancel(),
        }
    }

    pub async fn shutdown(&self) {
        self.ticker.lock().await.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::Repository;
    use std::time::Duration;
    use tokio::time;

    fn state() -> AppState {
        let clock = Arc::new(ManualClock::new(1_704_067_200_000));
        AppState::new(Tracker::new(clock, Repository::in_memory(), 5))
    }

    #[tokio::test(start_paused = true)]
    async fn late_sync_after_pause_keeps_a_restarted_timer_ticking() {
        let state = state();
        state.tracker.lock().await.start_timer().unwrap();
        state.sync_ticker().await;

        state.tracker.lock().await.pause_timer().unwrap();
        // A second request restarts the timer before the pause request syncs.
        state.tracker.lock().await.start_timer().unwrap();
        state.sync_ticker().await;
        state.sync_ticker().await;

        time::sleep(Duration::from_millis(5_500)).await;
        let view = state.tracker.lock().await.timer();
        assert_eq!(view.status, TimerStatus::Running);
        assert_eq!(view.elapsed, 5);
        assert!(state.ticker.lock().await.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_cancels_once_timer_stops() {
        let state = state();
        state.tracker.lock().await.start_timer().unwrap();
        state.sync_ticker().await;
        assert!(state.ticker.lock().await.is_armed());

        state.tracker.lock().await.stop_timer().unwrap();
        state.sync_ticker().await;
        assert!(!state.ticker.lock().await.is_armed());
    }
}
