use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Asia/Shanghai has observed no DST since 1991, so a fixed offset is exact.
const DAY_OFFSET_SECS: i32 = 8 * 3600;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;

    fn today_key(&self) -> String {
        day_key(self.now_ms())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn day_offset() -> FixedOffset {
    FixedOffset::east_opt(DAY_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// Formats an epoch-millisecond instant as the `YYYY-MM-DD` day key.
pub fn day_key(ms: i64) -> String {
    day_of(ms).format("%Y-%m-%d").to_string()
}

pub fn day_of(ms: i64) -> NaiveDate {
    let utc = DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default();
    utc.with_timezone(&day_offset()).date_naive()
}

/// Parses a strict `YYYY-MM-DD` key.
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    let bytes = key.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

pub fn iso_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339()
}
