//! Time source for entities
//!
//! Entities never call `Utc::now()` directly; they ask the runtime clock so
//! tests can pin "now" with [`ManualClock`].

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync + 'static {
    /// Current Unix millis
    fn now_millis(&self) -> i64;

    /// Current wall time in the venue's time zone
    fn local_now(&self, tz: Tz) -> NaiveDateTime {
        millis_to_local(self.now_millis(), tz)
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        shared::util::now_millis()
    }
}

/// Test clock, only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// Start at a venue-local wall time
    pub fn at_local(local: NaiveDateTime, tz: Tz) -> Self {
        Self::new(local_to_millis(local, tz))
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: std::time::Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Unix millis → venue-local wall time
pub fn millis_to_local(millis: i64, tz: Tz) -> NaiveDateTime {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&tz)
        .naive_local()
}

/// Venue-local wall time → Unix millis
///
/// DST gap fallback: 如果本地时间不存在 (夏令时跳跃)，fallback 到 UTC。
pub fn local_to_millis(local: NaiveDateTime, tz: Tz) -> i64 {
    local
        .and_local_timezone(tz)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| local.and_utc().timestamp_millis())
}
