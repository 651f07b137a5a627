//! Count-up timer built on [`Clock`].
//!
//! A stopwatch is a clock counting down from its bound; elapsed time is
//! `bound - remaining`. Without a configured limit the bound is
//! [`UNBOUNDED_MS`], which is long enough to be effectively unlimited.

use std::fmt;

use chrono::Utc;
use tracing::debug;

use super::clock::{Clock, TimerState};
use super::scheduler::SharedScheduler;
use crate::events::Event;

/// 99:59:59, the largest value a two-digit-hours display can show.
pub const UNBOUNDED_MS: i64 = (99 * 3600 + 59 * 60 + 59) * 1000;

#[derive(Default)]
pub struct StopwatchCallbacks {
    pub on_tick: Option<Box<dyn FnMut(i64)>>,
    pub on_stop: Option<Box<dyn FnMut(i64)>>,
    pub on_state_change: Option<Box<dyn FnMut(TimerState)>>,
}

impl StopwatchCallbacks {
    pub fn on_tick(mut self, f: impl FnMut(i64) + 'static) -> Self {
        self.on_tick = Some(Box::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl FnMut(i64) + 'static) -> Self {
        self.on_stop = Some(Box::new(f));
        self
    }

    pub fn on_state_change(mut self, f: impl FnMut(TimerState) + 'static) -> Self {
        self.on_state_change = Some(Box::new(f));
        self
    }
}

pub struct Stopwatch {
    clock: Clock,
    bound_ms: i64,
    time_limit_ms: Option<i64>,
    callbacks: StopwatchCallbacks,
}

impl Stopwatch {
    pub fn new(scheduler: SharedScheduler, time_limit_ms: Option<i64>) -> Self {
        Self::with_callbacks(scheduler, time_limit_ms, StopwatchCallbacks::default())
    }

    pub fn with_callbacks(
        scheduler: SharedScheduler,
        time_limit_ms: Option<i64>,
        callbacks: StopwatchCallbacks,
    ) -> Self {
        let bound_ms = time_limit_ms.unwrap_or(UNBOUNDED_MS);
        Self {
            clock: Clock::new(scheduler, bound_ms),
            bound_ms,
            time_limit_ms,
            callbacks,
        }
    }

    pub fn state(&self) -> TimerState {
        self.clock.state()
    }

    pub fn time_limit(&self) -> Option<i64> {
        self.time_limit_ms
    }

    pub fn bound(&self) -> i64 {
        self.bound_ms
    }

    /// Elapsed milliseconds as of the last tick, never above the bound.
    pub fn elapsed(&self) -> i64 {
        (self.bound_ms - self.clock.time()).min(self.bound_ms)
    }

    pub fn has_reached_bound(&self) -> bool {
        self.clock.state() == TimerState::Completed
    }

    pub fn start(&mut self) -> Option<Event> {
        if self.has_reached_bound() {
            self.clock.reset();
        }
        let event = self.clock.start();
        if event.is_some() {
            self.emit_state();
        }
        event
    }

    pub fn pause(&mut self) -> Option<Event> {
        let event = self.clock.pause();
        if event.is_some() {
            self.emit_state();
        }
        event
    }

    pub fn reset(&mut self) -> Option<Event> {
        let event = self.clock.reset();
        if event.is_some() {
            self.emit_state();
        }
        event
    }

    /// Take a final reading, report it through `on_stop`, then zero the
    /// stopwatch. Returns the reading.
    pub fn stop(&mut self) -> (i64, Option<Event>) {
        if self.clock.is_destroyed() {
            return (0, None);
        }
        self.clock.pause();
        let elapsed = self.elapsed();
        debug!(elapsed_ms = elapsed, "stopwatch stopped");
        if let Some(cb) = self.callbacks.on_stop.as_mut() {
            cb(elapsed);
        }
        self.clock.reset();
        self.emit_state();
        (
            elapsed,
            Some(Event::StopwatchStopped {
                elapsed_ms: elapsed,
                at: Utc::now(),
            }),
        )
    }

    pub fn destroy(&mut self) {
        self.clock.destroy();
    }

    /// Forward a due frame. Returns `Some(Event::ClockCompleted)` once the
    /// bound is reached.
    pub fn tick(&mut self) -> Option<Event> {
        if self.clock.state() != TimerState::Running {
            return None;
        }
        let event = self.clock.tick();
        let elapsed = self.elapsed();
        if let Some(cb) = self.callbacks.on_tick.as_mut() {
            cb(elapsed);
        }
        if event.is_some() {
            self.emit_state();
        }
        event
    }

    fn emit_state(&mut self) {
        let state = self.clock.state();
        if let Some(cb) = self.callbacks.on_state_change.as_mut() {
            cb(state);
        }
    }
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopwatch")
            .field("bound_ms", &self.bound_ms)
            .field("elapsed_ms", &self.elapsed())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::timer::scheduler::{ManualScheduler, Scheduler};

    #[test]
    fn counts_up() {
        let s = ManualScheduler::shared();
        let mut sw = Stopwatch::new(s.clone(), None);
        sw.start();
        s.advance(1_250);
        sw.tick();
        assert_eq!(sw.elapsed(), 1_250);
        assert_eq!(sw.time_limit(), None);
        assert_eq!(sw.bound(), UNBOUNDED_MS);
    }

    #[test]
    fn stop_reports_then_zeroes() {
        let s = ManualScheduler::shared();
        let stops = Rc::new(RefCell::new(Vec::new()));
        let seen = stops.clone();
        let mut sw = Stopwatch::with_callbacks(
            s.clone(),
            None,
            StopwatchCallbacks::default().on_stop(move |ms| seen.borrow_mut().push(ms)),
        );
        sw.start();
        s.advance(400);
        sw.tick();
        s.advance(100);

        let (elapsed, event) = sw.stop();
        assert_eq!(elapsed, 500);
        assert!(matches!(event, Some(Event::StopwatchStopped { elapsed_ms: 500, .. })));
        assert_eq!(*stops.borrow(), vec![500]);
        assert_eq!(sw.elapsed(), 0);
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn limit_completes_and_restart_resets() {
        let s = ManualScheduler::shared();
        let mut sw = Stopwatch::new(s.clone(), Some(1_000));
        assert_eq!(sw.time_limit(), Some(1_000));
        sw.start();
        s.advance(1_500);
        assert!(sw.tick().is_some());
        assert!(sw.has_reached_bound());
        assert_eq!(sw.elapsed(), 1_000);

        assert!(sw.start().is_some());
        assert_eq!(sw.state(), TimerState::Running);
        assert_eq!(sw.elapsed(), 0);
    }

    #[test]
    fn pause_keeps_reading() {
        let s = ManualScheduler::shared();
        let mut sw = Stopwatch::new(s.clone(), None);
        sw.start();
        s.advance(300);
        sw.pause();
        s.advance(10_000);
        sw.start();
        s.advance(200);
        sw.tick();
        assert_eq!(sw.elapsed(), 500);
    }

    #[test]
    fn tick_reports_elapsed() {
        let s = ManualScheduler::shared();
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let seen = ticks.clone();
        let mut sw = Stopwatch::with_callbacks(
            s.clone(),
            None,
            StopwatchCallbacks::default().on_tick(move |ms| seen.borrow_mut().push(ms)),
        );
        sw.start();
        s.advance(16);
        sw.tick();
        s.advance(17);
        sw.tick();
        assert_eq!(*ticks.borrow(), vec![16, 33]);
    }
}
