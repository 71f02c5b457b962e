use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::models::{Session, SessionStatus};

/// Source of "now" for the drivers. Injected so tests can move time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day in the local timezone, the unit sessions are keyed by.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Timestamps needed to compute active time. Built from a server record
/// plus whatever the local view has not yet had confirmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSnapshot {
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_paused_seconds: u64,
    pub status: SessionStatus,
}

impl From<&Session> for ClockSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            started_at: session.started_at,
            paused_at: session.paused_at,
            total_paused_seconds: session.total_paused_seconds,
            status: session.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub elapsed_seconds: u64,
    /// Raw value was negative and got clamped to zero.
    pub clamped: bool,
}

/// Active seconds at `now`: wall time since start, minus paused time.
///
/// A paused session is measured up to its pause instant so repeated samples
/// never move. A paused snapshot without a pause instant is measured at `now`.
pub fn sample(snapshot: &ClockSnapshot, now: DateTime<Utc>) -> Sample {
    let until = match (snapshot.status, snapshot.paused_at) {
        (SessionStatus::Paused, Some(paused_at)) => paused_at,
        _ => now,
    };

    let wall_seconds = (until - snapshot.started_at).num_milliseconds().div_euclid(1000);
    let paused = i64::try_from(snapshot.total_paused_seconds).unwrap_or(i64::MAX);
    let raw = wall_seconds.saturating_sub(paused);

    if raw < 0 {
        Sample {
            elapsed_seconds: 0,
            clamped: true,
        }
    } else {
        Sample {
            elapsed_seconds: raw as u64,
            clamped: false,
        }
    }
}

pub fn elapsed_active_seconds(snapshot: &ClockSnapshot, now: DateTime<Utc>) -> u64 {
    sample(snapshot, now).elapsed_seconds
}

/// Hand-driven clock for tests.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub(crate) fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = instant;
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
