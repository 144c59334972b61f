use std::cell::Cell;
use std::rc::Rc;

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};

        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
            // System clock set before 1970.
            Err(_) => 0,
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    /// Move time by `delta_ms`, which may be negative to simulate a clock
    /// being wound back.
    pub fn advance(&self, delta_ms: i64) {
        self.now.set(self.now.get().saturating_add(delta_ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}
