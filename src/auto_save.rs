use std::cell::Cell;
use std::time::Duration;

use log::{debug, info};

use crate::app_response::AppResponse;
use crate::config::SaveConfig;
use crate::save_record::SaveRecord;

/// What a call to [`AutoSave::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoSaveTick {
    /// Auto-save is not running.
    Stopped,
    /// The interval has not elapsed yet.
    NotDue { due_at: i64 },
    /// A save started by an earlier tick has not returned yet.
    InFlight,
    Saved(Result<SaveRecord, AppResponse>),
}

/// Auto-save cadence driven by the host's timer.
///
/// The host calls [`tick`](Self::tick) from its timer callback and passes the
/// same closure it uses for manual saves, so both paths end in
/// [`SaveStore::save`](crate::save_store::SaveStore::save). A tick arriving
/// while a save is still running is a no-op, and once [`stop`](Self::stop)
/// has returned no tick will invoke the save closure again.
#[derive(Debug)]
pub struct AutoSave {
    enabled: bool,
    interval_ms: i64,
    next_due: Cell<Option<i64>>,
    in_flight: Cell<bool>,
}

impl AutoSave {
    pub fn new(config: &SaveConfig) -> Self {
        Self::with_interval(config.auto_save, config.auto_save_interval)
    }

    pub fn with_interval(enabled: bool, interval: Duration) -> Self {
        let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX).max(1);
        Self {
            enabled,
            interval_ms,
            next_due: Cell::new(None),
            in_flight: Cell::new(false),
        }
    }

    /// Arm the first save at `now + interval`. Returns false when auto-save
    /// is disabled or already running.
    pub fn start(&self, now: i64) -> bool {
        if !self.enabled || self.next_due.get().is_some() {
            return false;
        }
        self.next_due.set(Some(now.saturating_add(self.interval_ms)));
        info!("Auto-save started, every {} ms", self.interval_ms);
        true
    }

    pub fn stop(&self) {
        if self.next_due.replace(None).is_some() {
            info!("Auto-save stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_due.get().is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.get()
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Run `save` if the interval has elapsed. The next save is scheduled one
    /// interval after `now`, so missed ticks are not replayed.
    pub fn tick<F>(&self, now: i64, save: F) -> AutoSaveTick
    where
        F: FnOnce() -> Result<SaveRecord, AppResponse>,
    {
        let Some(due_at) = self.next_due.get() else {
            return AutoSaveTick::Stopped;
        };
        if self.in_flight.get() {
            debug!("Auto-save tick skipped: previous save still running");
            return AutoSaveTick::InFlight;
        }
        if now < due_at {
            return AutoSaveTick::NotDue { due_at };
        }

        self.next_due.set(Some(now.saturating_add(self.interval_ms)));
        let _guard = InFlightGuard::enter(&self.in_flight);
        AutoSaveTick::Saved(save())
    }
}

struct InFlightGuard<'a>(&'a Cell<bool>);

impl<'a> InFlightGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
