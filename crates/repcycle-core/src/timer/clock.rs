//! Countdown clock.
//!
//! The clock is a wall-clock-delta state machine. It never measures time by
//! counting frames: every `tick()` subtracts the real time elapsed since the
//! previous tick, so a late or irregular frame does not accumulate drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            v
//!        Completed
//! ```
//!
//! `reset()` returns to Idle from anywhere.
//!
//! ## Usage
//!
//! ```ignore
//! let mut clock = Clock::new(scheduler, 30_000);
//! clock.start();
//! // Whenever the host's frame is due:
//! clock.tick(); // Returns Some(Event::ClockCompleted) once, at zero
//! ```

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::scheduler::{FrameToken, SharedScheduler};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerState {
    pub fn is_active(self) -> bool {
        matches!(self, TimerState::Running | TimerState::Paused)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Optional observers for a clock.
#[derive(Default)]
pub struct ClockCallbacks {
    pub on_tick: Option<Box<dyn FnMut(i64)>>,
    pub on_state_change: Option<Box<dyn FnMut(TimerState)>>,
    pub on_complete: Option<Box<dyn FnMut()>>,
}

impl ClockCallbacks {
    pub fn on_tick(mut self, f: impl FnMut(i64) + 'static) -> Self {
        self.on_tick = Some(Box::new(f));
        self
    }

    pub fn on_state_change(mut self, f: impl FnMut(TimerState) + 'static) -> Self {
        self.on_state_change = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for ClockCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockCallbacks")
            .field("on_tick", &self.on_tick.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Countdown primitive shared by every timer flavor.
pub struct Clock {
    scheduler: SharedScheduler,
    callbacks: ClockCallbacks,
    initial_ms: i64,
    /// Remaining time in milliseconds. Only changes while Running (or via `set_time`).
    remaining_ms: i64,
    state: TimerState,
    /// When the current Running stretch began.
    start_at_ms: Option<u64>,
    /// Timestamp of the last tick, used to compute the next delta.
    last_tick_ms: Option<u64>,
    frame: Option<FrameToken>,
    destroyed: bool,
}

impl Clock {
    /// Create an idle clock counting down from `initial_ms`.
    pub fn new(scheduler: SharedScheduler, initial_ms: i64) -> Self {
        Self::with_callbacks(scheduler, initial_ms, ClockCallbacks::default())
    }

    pub fn with_callbacks(
        scheduler: SharedScheduler,
        initial_ms: i64,
        callbacks: ClockCallbacks,
    ) -> Self {
        Self {
            scheduler,
            callbacks,
            initial_ms,
            remaining_ms: initial_ms,
            state: TimerState::Idle,
            start_at_ms: None,
            last_tick_ms: None,
            frame: None,
            destroyed: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Remaining milliseconds as of the last tick.
    pub fn time(&self) -> i64 {
        self.remaining_ms
    }

    pub fn initial_time(&self) -> i64 {
        self.initial_ms
    }

    pub fn total_elapsed(&self) -> i64 {
        self.initial_ms - self.remaining_ms
    }

    /// When the current Running stretch began, on the scheduler's timeline.
    pub fn started_at(&self) -> Option<u64> {
        self.start_at_ms
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frame.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.destroyed {
            return None;
        }
        match self.state {
            TimerState::Idle | TimerState::Paused => {
                let now = self.scheduler.now_ms();
                self.start_at_ms = Some(now);
                self.last_tick_ms = Some(now);
                self.state = TimerState::Running;
                self.arm();
                debug!(remaining_ms = self.remaining_ms, "clock running");
                self.emit_state();
                Some(Event::ClockStarted {
                    initial_ms: self.initial_ms,
                    remaining_ms: self.remaining_ms,
                    at: Utc::now(),
                })
            }
            // Already running, or finished and waiting for a reset.
            TimerState::Running | TimerState::Completed => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.destroyed || self.state != TimerState::Running {
            return None;
        }
        self.disarm();
        self.flush_elapsed();
        self.state = TimerState::Paused;
        self.start_at_ms = None;
        self.last_tick_ms = None;
        debug!(remaining_ms = self.remaining_ms, "clock paused");
        self.emit_state();
        Some(Event::ClockPaused {
            remaining_ms: self.remaining_ms,
            at: Utc::now(),
        })
    }

    /// Back to Idle with the full initial time. Never fires `on_complete`.
    pub fn reset(&mut self) -> Option<Event> {
        if self.destroyed {
            return None;
        }
        self.disarm();
        self.remaining_ms = self.initial_ms;
        self.start_at_ms = None;
        self.last_tick_ms = None;
        self.state = TimerState::Idle;
        self.emit_state();
        Some(Event::ClockReset {
            initial_ms: self.initial_ms,
            at: Utc::now(),
        })
    }

    /// Overwrite the remaining time. Negative values are accepted and clamp
    /// to zero on the next tick.
    pub fn set_time(&mut self, ms: i64) {
        if self.destroyed {
            return;
        }
        self.remaining_ms = ms;
    }

    /// Cancel the pending frame and make every later call a no-op.
    pub fn destroy(&mut self) {
        self.disarm();
        self.destroyed = true;
    }

    /// Call when the scheduled frame is due. Returns
    /// `Some(Event::ClockCompleted)` exactly once, on the tick that reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if self.destroyed || self.state != TimerState::Running {
            return None;
        }
        let token = self.frame.take()?;
        self.scheduler.cancel(token);

        self.flush_elapsed();
        let remaining = self.remaining_ms;
        trace!(remaining_ms = remaining, "clock tick");
        if let Some(cb) = self.callbacks.on_tick.as_mut() {
            cb(remaining);
        }

        if self.remaining_ms == 0 {
            self.state = TimerState::Completed;
            self.start_at_ms = None;
            self.last_tick_ms = None;
            debug!(initial_ms = self.initial_ms, "clock completed");
            if let Some(cb) = self.callbacks.on_complete.as_mut() {
                cb();
            }
            self.emit_state();
            return Some(Event::ClockCompleted {
                initial_ms: self.initial_ms,
                at: Utc::now(),
            });
        }

        self.arm();
        None
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_elapsed(&mut self) {
        let now = self.scheduler.now_ms();
        let delta = match self.last_tick_ms {
            Some(last) => now.saturating_sub(last),
            None => 0,
        };
        self.last_tick_ms = Some(now);
        let delta = i64::try_from(delta).unwrap_or(i64::MAX);
        self.remaining_ms = self.remaining_ms.saturating_sub(delta).max(0);
    }

    fn arm(&mut self) {
        if self.frame.is_none() {
            self.frame = Some(self.scheduler.schedule());
        }
    }

    fn disarm(&mut self) {
        if let Some(token) = self.frame.take() {
            self.scheduler.cancel(token);
        }
    }

    fn emit_state(&mut self) {
        let state = self.state;
        if let Some(cb) = self.callbacks.on_state_change.as_mut() {
            cb(state);
        }
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("initial_ms", &self.initial_ms)
            .field("remaining_ms", &self.remaining_ms)
            .field("state", &self.state)
            .field("frame", &self.frame)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.disarm();
    }
}
