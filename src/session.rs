//! Play-time accounting across pause/resume cycles.
//!
//! ```text
//! Inactive --start--> Active --pause--> Inactive --resume--> Active
//!                       |                                      |
//!                       +------------------end-----------------+--> Ended
//! ```
//!
//! The tracker is the only owner of [`SessionTimeState`]. Elapsed intervals
//! are clamped at zero, so a clock that jumps backwards can never reduce the
//! accumulated play time.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimeState {
    /// Milliseconds accumulated by closed intervals.
    pub total_play_time: i64,
    /// Start of the open interval, 0 while inactive.
    pub session_start_time: i64,
    pub last_active_time: i64,
    pub is_active: bool,
}

/// The persistable part of a session, as stored in a save payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub total_play_time: i64,
    pub last_active_time: i64,
}

pub struct SessionTracker<C: Clock> {
    clock: C,
    state: SessionTimeState,
    ended: bool,
}

impl<C: Clock> SessionTracker<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: SessionTimeState::default(),
            ended: false,
        }
    }

    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        self.state.session_start_time = now;
        self.state.last_active_time = now;
        self.state.is_active = true;
        self.ended = false;
        debug!("Session started at {now}");
    }

    /// Fold the open interval into the total and go inactive.
    pub fn pause(&mut self) {
        if !self.state.is_active {
            debug!("pause ignored: session already inactive");
            return;
        }
        let now = self.clock.now_ms();
        self.state.total_play_time = self
            .state
            .total_play_time
            .saturating_add(self.open_interval(now));
        self.state.session_start_time = 0;
        self.state.last_active_time = now;
        self.state.is_active = false;
    }

    /// Reactivate and return how long the session was inactive.
    ///
    /// Returns 0 when already active, when no activity was ever recorded, or
    /// after [`end`](Self::end) (an ended session needs a new `start`).
    pub fn resume(&mut self) -> i64 {
        if self.ended {
            debug!("resume ignored: session has ended");
            return 0;
        }
        let now = self.clock.now_ms();
        let offline = if self.state.is_active || self.state.last_active_time <= 0 {
            0
        } else {
            now.saturating_sub(self.state.last_active_time).max(0)
        };

        if !self.state.is_active {
            self.state.session_start_time = now;
            self.state.is_active = true;
        }
        self.state.last_active_time = now;
        offline
    }

    pub fn end(&mut self) {
        self.pause();
        self.ended = true;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Accumulated play time including the open interval.
    pub fn total_play_time(&self) -> i64 {
        let open = if self.state.is_active {
            self.open_interval(self.clock.now_ms())
        } else {
            0
        };
        self.state.total_play_time.saturating_add(open)
    }

    /// Length of the open interval, 0 while inactive.
    pub fn session_duration(&self) -> i64 {
        if self.state.is_active {
            self.open_interval(self.clock.now_ms())
        } else {
            0
        }
    }

    pub fn state(&self) -> SessionTimeState {
        self.state
    }

    /// Snapshot for a save payload. The total includes the open interval.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            total_play_time: self.total_play_time(),
            last_active_time: self.state.last_active_time,
        }
    }

    /// Restore from a save. Negative values are treated as zero. The
    /// tracker is left inactive; call [`resume`](Self::resume) to get the gap
    /// since `last_active_time`.
    pub fn set_state(&mut self, snapshot: SessionSnapshot) {
        self.state = SessionTimeState {
            total_play_time: snapshot.total_play_time.max(0),
            session_start_time: 0,
            last_active_time: snapshot.last_active_time.max(0),
            is_active: false,
        };
        self.ended = false;
    }

    pub fn set_total_play_time(&mut self, total_ms: i64) {
        self.state.total_play_time = total_ms.max(0);
    }

    pub fn reset(&mut self) {
        self.state = SessionTimeState::default();
        self.ended = false;
    }

    fn open_interval(&self, now: i64) -> i64 {
        if self.state.session_start_time <= 0 {
            return 0;
        }
        now.saturating_sub(self.state.session_start_time).max(0)
    }
}
