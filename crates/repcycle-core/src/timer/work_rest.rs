//! Work/rest ratio engine.
//!
//! Work is open-ended and measured with a [`Stopwatch`]; rest is a [`Clock`]
//! whose length is derived from the work just measured (ratio mode) or taken
//! from configuration (fixed mode).
//!
//! ## Phase Transitions
//!
//! ```text
//! Idle --start_work--> Work --stop_work--> (pre-rest delay) --> Rest --complete--> Idle
//!                        ^                                       |  |
//!                        +-------------- skip_rest --------------+  +--stop_rest--> Idle
//! ```
//!
//! The ratio is fixed-point: 100 centiunits is 1.00x, so repeated
//! `adjust_ratio` calls always land on exact values.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::{Clock, TimerState};
use super::scheduler::{FrameToken, SharedScheduler};
use super::stopwatch::{Stopwatch, UNBOUNDED_MS};
use crate::events::Event;

pub const MIN_RATIO: u32 = 1;
pub const MAX_RATIO: u32 = 10_000;
pub const DEFAULT_RATIO: u32 = 100;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 1_000;
pub const DEFAULT_MAX_ROUNDS: u32 = 10;
pub const DEFAULT_FIXED_REST_SECS: u32 = 60;
/// Pause between stopping work and the rest countdown appearing.
pub const PRE_REST_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Work,
    Rest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestMode {
    #[default]
    Ratio,
    Fixed,
}

/// Construction options. Unset fields take the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRestOptions {
    /// Centiunits; 250 is 2.50x.
    pub ratio: Option<u32>,
    pub max_rounds: Option<u32>,
    pub max_work_time_ms: Option<i64>,
    pub rest_mode: Option<RestMode>,
    pub fixed_rest_secs: Option<u32>,
}

/// Snapshot handed to observers and hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRestState {
    pub phase: Phase,
    pub ratio: u32,
    pub rounds: u32,
    pub max_rounds: u32,
    pub rest_mode: RestMode,
    pub fixed_rest_secs: u32,
    /// Elapsed during Work, remaining during Rest, 0 when Idle.
    pub current_time_ms: i64,
    pub state: TimerState,
}

#[derive(Default)]
pub struct WorkRestCallbacks {
    pub on_lap_recorded: Option<Box<dyn FnMut(i64)>>,
    pub on_state_change: Option<Box<dyn FnMut(&WorkRestState)>>,
}

impl WorkRestCallbacks {
    pub fn on_lap_recorded(mut self, f: impl FnMut(i64) + 'static) -> Self {
        self.on_lap_recorded = Some(Box::new(f));
        self
    }

    pub fn on_state_change(mut self, f: impl FnMut(&WorkRestState) + 'static) -> Self {
        self.on_state_change = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRest {
    token: FrameToken,
    due_at_ms: u64,
    rest_ms: i64,
}

pub fn clamp_ratio(ratio: i64) -> u32 {
    ratio.clamp(MIN_RATIO as i64, MAX_RATIO as i64) as u32
}

pub fn clamp_rounds(rounds: i64) -> u32 {
    rounds.clamp(MIN_ROUNDS as i64, MAX_ROUNDS as i64) as u32
}

/// Rest length for a measured work segment, rounded half-up to whole
/// milliseconds and capped at `ceiling_ms`.
pub fn rest_duration_ms(
    work_ms: i64,
    mode: RestMode,
    ratio: u32,
    fixed_rest_secs: u32,
    ceiling_ms: i64,
) -> i64 {
    let rest = match mode {
        RestMode::Fixed => i64::from(fixed_rest_secs) * 1000,
        RestMode::Ratio => (work_ms.max(0) * i64::from(ratio) + 50) / 100,
    };
    rest.min(ceiling_ms)
}

pub struct WorkRestEngine {
    scheduler: SharedScheduler,
    options: WorkRestOptions,
    callbacks: WorkRestCallbacks,
    phase: Phase,
    ratio: u32,
    rounds: u32,
    max_rounds: u32,
    rest_mode: RestMode,
    fixed_rest_secs: u32,
    max_work_ms: i64,
    work: Option<Stopwatch>,
    rest: Option<Clock>,
    rest_total_ms: i64,
    last_work_ms: i64,
    pending_rest: Option<PendingRest>,
}

impl WorkRestEngine {
    pub fn new(scheduler: SharedScheduler, options: WorkRestOptions) -> Self {
        Self::with_callbacks(scheduler, options, WorkRestCallbacks::default())
    }

    pub fn with_callbacks(
        scheduler: SharedScheduler,
        options: WorkRestOptions,
        callbacks: WorkRestCallbacks,
    ) -> Self {
        let mut engine = Self {
            scheduler,
            options,
            callbacks,
            phase: Phase::Idle,
            ratio: DEFAULT_RATIO,
            rounds: 0,
            max_rounds: DEFAULT_MAX_ROUNDS,
            rest_mode: RestMode::Ratio,
            fixed_rest_secs: DEFAULT_FIXED_REST_SECS,
            max_work_ms: UNBOUNDED_MS,
            work: None,
            rest: None,
            rest_total_ms: 0,
            last_work_ms: 0,
            pending_rest: None,
        };
        engine.apply_options();
        engine.ratio = engine
            .options
            .ratio
            .map(|r| clamp_ratio(i64::from(r)))
            .unwrap_or(DEFAULT_RATIO);
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn rest_mode(&self) -> RestMode {
        self.rest_mode
    }

    pub fn is_rest_pending(&self) -> bool {
        self.pending_rest.is_some()
    }

    pub fn state(&self) -> WorkRestState {
        let (current_time_ms, state) = match self.phase {
            Phase::Idle => (0, TimerState::Idle),
            Phase::Work => match (&self.work, self.pending_rest) {
                (_, Some(_)) => (self.last_work_ms, TimerState::Completed),
                (Some(sw), None) => (sw.elapsed(), sw.state()),
                (None, None) => (0, TimerState::Idle),
            },
            Phase::Rest => match &self.rest {
                Some(clock) => (clock.time(), clock.state()),
                None => (0, TimerState::Idle),
            },
        };
        WorkRestState {
            phase: self.phase,
            ratio: self.ratio,
            rounds: self.rounds,
            max_rounds: self.max_rounds,
            rest_mode: self.rest_mode,
            fixed_rest_secs: self.fixed_rest_secs,
            current_time_ms,
            state,
        }
    }

    /// Percentage of the current rest already served. Work has no fixed
    /// length, so this is 0 outside Rest.
    pub fn progress(&self) -> f64 {
        if self.phase != Phase::Rest || self.rest_total_ms <= 0 {
            return 0.0;
        }
        let remaining = self.rest.as_ref().map(|c| c.time()).unwrap_or(0);
        let total = self.rest_total_ms as f64;
        ((total - remaining as f64) / total * 100.0).clamp(0.0, 100.0)
    }

    // ── Session commands ─────────────────────────────────────────────

    pub fn start_work(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.phase != Phase::Idle {
            return events;
        }
        self.begin_work(&mut events);
        events
    }

    pub fn pause_work(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.phase != Phase::Work || self.pending_rest.is_some() {
            return events;
        }
        if let Some(sw) = self.work.as_mut() {
            events.extend(sw.pause());
        }
        self.emit_state();
        events
    }

    pub fn resume_work(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.phase != Phase::Work || self.pending_rest.is_some() {
            return events;
        }
        if let Some(sw) = self.work.as_mut() {
            if sw.state() == TimerState::Paused {
                events.extend(sw.start());
            }
        }
        self.emit_state();
        events
    }

    /// Finish the work segment. Measured work of 0 ms goes straight back
    /// to Idle; anything else is recorded as a lap and followed by rest.
    pub fn stop_work(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.phase != Phase::Work || self.pending_rest.is_some() {
            return events;
        }
        let Some(mut sw) = self.work.take() else {
            return events;
        };
        let (elapsed, stopped) = sw.stop();
        sw.destroy();
        events.extend(stopped);
        self.finish_work(elapsed, &mut events);
        events
    }

    /// End the rest early and count the round. A rest that is still in its
    /// pre-rest delay is skipped before it starts.
    pub fn skip_rest(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.pending_rest.is_some() {
            self.cancel_pending_rest();
            self.drop_work();
        } else if self.phase == Phase::Rest {
            self.drop_rest();
        } else {
            return events;
        }
        self.complete_round(&mut events);
        if self.rounds >= self.max_rounds {
            self.set_phase(Phase::Idle, &mut events);
        } else {
            self.begin_work(&mut events);
        }
        events
    }

    /// Abort the rest. Unlike `skip_rest` this does not count the round.
    /// Also aborts a rest that is still waiting out the pre-rest delay.
    pub fn stop_rest(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.pending_rest.is_some() {
            self.cancel_pending_rest();
            self.drop_work();
        } else if self.phase == Phase::Rest {
            self.drop_rest();
        } else {
            return events;
        }
        self.set_phase(Phase::Idle, &mut events);
        events
    }

    pub fn reset(&mut self) {
        self.cancel_pending_rest();
        self.drop_work();
        self.drop_rest();
        self.phase = Phase::Idle;
        self.rounds = 0;
        self.ratio = DEFAULT_RATIO;
        self.rest_total_ms = 0;
        self.last_work_ms = 0;
        self.apply_options();
        debug!("work/rest engine reset");
        self.emit_state();
    }

    /// Drive the pre-rest delay and whichever segment is active.
    pub fn tick(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        match self.phase {
            Phase::Work => {
                if let Some(pending) = self.pending_rest {
                    if self.scheduler.now_ms() >= pending.due_at_ms {
                        self.cancel_pending_rest();
                        self.begin_rest(pending.rest_ms, &mut events);
                    }
                } else if let Some(sw) = self.work.as_mut() {
                    if sw.tick().is_some() {
                        debug!("work hit its ceiling");
                        events.extend(self.stop_work());
                    }
                }
            }
            Phase::Rest => {
                let completed = match self.rest.as_mut() {
                    Some(clock) => clock.tick().is_some(),
                    None => false,
                };
                if completed {
                    self.drop_rest();
                    self.complete_round(&mut events);
                    self.set_phase(Phase::Idle, &mut events);
                }
            }
            Phase::Idle => return events,
        }
        self.emit_state();
        events
    }

    // ── Configuration (Idle only) ────────────────────────────────────

    pub fn adjust_ratio(&mut self, delta_centiunits: i32) {
        if self.phase != Phase::Idle {
            return;
        }
        self.ratio = clamp_ratio(i64::from(self.ratio) + i64::from(delta_centiunits));
        self.emit_state();
    }

    /// Set the ratio from a multiplier, e.g. `2.5` for 2.50x.
    pub fn set_ratio(&mut self, ratio: f64) {
        if self.phase != Phase::Idle || !ratio.is_finite() {
            return;
        }
        self.ratio = clamp_ratio((ratio * 100.0).round() as i64);
        self.emit_state();
    }

    pub fn reset_ratio(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        self.ratio = DEFAULT_RATIO;
        self.emit_state();
    }

    pub fn set_max_rounds(&mut self, rounds: u32) {
        if self.phase != Phase::Idle {
            return;
        }
        self.max_rounds = clamp_rounds(i64::from(rounds));
        self.emit_state();
    }

    pub fn set_rest_mode(&mut self, mode: RestMode) {
        if self.phase != Phase::Idle {
            return;
        }
        self.rest_mode = mode;
        self.emit_state();
    }

    pub fn set_fixed_rest_secs(&mut self, secs: u32) {
        if self.phase != Phase::Idle {
            return;
        }
        self.fixed_rest_secs = secs;
        self.emit_state();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_options(&mut self) {
        let o = &self.options;
        self.max_rounds = o
            .max_rounds
            .map(|r| clamp_rounds(i64::from(r)))
            .unwrap_or(DEFAULT_MAX_ROUNDS);
        self.max_work_ms = o.max_work_time_ms.filter(|ms| *ms > 0).unwrap_or(UNBOUNDED_MS);
        self.rest_mode = o.rest_mode.unwrap_or_default();
        self.fixed_rest_secs = o.fixed_rest_secs.unwrap_or(DEFAULT_FIXED_REST_SECS);
    }

    fn begin_work(&mut self, events: &mut Vec<Event>) {
        let mut sw = Stopwatch::new(self.scheduler.clone(), Some(self.max_work_ms));
        events.extend(sw.start());
        self.work = Some(sw);
        self.last_work_ms = 0;
        self.set_phase(Phase::Work, events);
    }

    fn finish_work(&mut self, elapsed: i64, events: &mut Vec<Event>) {
        if elapsed <= 0 {
            debug!("no work measured, skipping rest");
            self.set_phase(Phase::Idle, events);
            return;
        }
        self.last_work_ms = elapsed;
        debug!(elapsed_ms = elapsed, "lap recorded");
        if let Some(cb) = self.callbacks.on_lap_recorded.as_mut() {
            cb(elapsed);
        }
        events.push(Event::LapRecorded {
            elapsed_ms: elapsed,
            at: Utc::now(),
        });

        let rest_ms = rest_duration_ms(
            elapsed,
            self.rest_mode,
            self.ratio,
            self.fixed_rest_secs,
            self.max_work_ms,
        );
        let token = self.scheduler.schedule();
        self.pending_rest = Some(PendingRest {
            token,
            due_at_ms: self.scheduler.now_ms() + PRE_REST_DELAY_MS,
            rest_ms,
        });
        events.push(Event::RestScheduled {
            rest_ms,
            starts_in_ms: PRE_REST_DELAY_MS,
            at: Utc::now(),
        });
        self.emit_state();
    }

    fn begin_rest(&mut self, rest_ms: i64, events: &mut Vec<Event>) {
        let mut clock = Clock::new(self.scheduler.clone(), rest_ms);
        events.extend(clock.start());
        self.rest = Some(clock);
        self.rest_total_ms = rest_ms;
        self.set_phase(Phase::Rest, events);
    }

    fn complete_round(&mut self, events: &mut Vec<Event>) {
        self.rounds += 1;
        debug!(rounds = self.rounds, max_rounds = self.max_rounds, "round completed");
        events.push(Event::RoundCompleted {
            rounds: self.rounds,
            at: Utc::now(),
        });
        if self.rounds == self.max_rounds {
            events.push(Event::SessionCompleted {
                rounds: self.rounds,
                at: Utc::now(),
            });
        }
    }

    fn set_phase(&mut self, to: Phase, events: &mut Vec<Event>) {
        let from = self.phase;
        self.phase = to;
        if to != Phase::Rest {
            self.rest_total_ms = 0;
        }
        let state = self.state().state;
        debug!(?from, ?to, "phase changed");
        events.push(Event::PhaseChanged {
            from,
            to,
            state,
            at: Utc::now(),
        });
        self.emit_state();
    }

    fn cancel_pending_rest(&mut self) {
        if let Some(pending) = self.pending_rest.take() {
            self.scheduler.cancel(pending.token);
        }
    }

    fn drop_work(&mut self) {
        if let Some(mut sw) = self.work.take() {
            sw.destroy();
        }
    }

    fn drop_rest(&mut self) {
        if let Some(mut clock) = self.rest.take() {
            clock.destroy();
        }
    }

    fn emit_state(&mut self) {
        if self.callbacks.on_state_change.is_none() {
            return;
        }
        let snapshot = self.state();
        if let Some(cb) = self.callbacks.on_state_change.as_mut() {
            cb(&snapshot);
        }
    }
}

impl fmt::Debug for WorkRestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkRestEngine")
            .field("state", &self.state())
            .field("rest_pending", &self.pending_rest.is_some())
            .finish()
    }
}

impl Drop for WorkRestEngine {
    fn drop(&mut self) {
        self.cancel_pending_rest();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::timer::scheduler::{ManualScheduler, Scheduler};

    fn engine_with_ratio(s: &Rc<ManualScheduler>, ratio: u32) -> WorkRestEngine {
        WorkRestEngine::new(
            s.clone(),
            WorkRestOptions {
                ratio: Some(ratio),
                ..Default::default()
            },
        )
    }

    fn work_for(engine: &mut WorkRestEngine, s: &ManualScheduler, ms: u64) {
        engine.start_work();
        s.advance(ms);
        engine.tick();
        engine.stop_work();
    }

    #[test]
    fn rest_follows_measured_work_after_delay() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 200);
        work_for(&mut engine, &s, 500);

        assert_eq!(engine.phase(), Phase::Work);
        assert!(engine.is_rest_pending());
        assert_eq!(engine.state().state, TimerState::Completed);

        s.advance(PRE_REST_DELAY_MS - 1);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Work);

        s.advance(1);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Rest);
        assert_eq!(engine.state().current_time_ms, 1_000);
        assert_eq!(engine.state().state, TimerState::Running);
    }

    #[test]
    fn rest_completion_counts_a_round() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 100);
        work_for(&mut engine, &s, 400);
        s.advance(PRE_REST_DELAY_MS);
        engine.tick();

        s.advance(200);
        engine.tick();
        assert!((engine.progress() - 50.0).abs() < 1e-9);

        s.advance(200);
        let events = engine.tick();
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.rounds(), 1);
        assert!(events.iter().any(|e| matches!(e, Event::RoundCompleted { rounds: 1, .. })));
        assert_eq!(engine.progress(), 0.0);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn zero_work_goes_straight_to_idle() {
        let s = ManualScheduler::shared();
        let laps = Rc::new(RefCell::new(Vec::new()));
        let l = laps.clone();
        let mut engine = WorkRestEngine::with_callbacks(
            s.clone(),
            WorkRestOptions::default(),
            WorkRestCallbacks::default().on_lap_recorded(move |ms| l.borrow_mut().push(ms)),
        );
        engine.start_work();
        let events = engine.stop_work();

        assert_eq!(engine.phase(), Phase::Idle);
        assert!(!engine.is_rest_pending());
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::PhaseChanged { to: Phase::Rest, .. })));

        s.advance(PRE_REST_DELAY_MS * 5);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.rounds(), 0);
        assert!(laps.borrow().is_empty());
    }

    #[test]
    fn skip_rest_counts_round_and_starts_work_immediately() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 100);
        work_for(&mut engine, &s, 1_000);
        s.advance(PRE_REST_DELAY_MS);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Rest);

        engine.skip_rest();
        assert_eq!(engine.rounds(), 1);
        assert_eq!(engine.phase(), Phase::Work);
        assert_eq!(engine.state().state, TimerState::Running);
        assert!(!engine.is_rest_pending());
    }

    #[test]
    fn skip_rest_at_max_rounds_goes_idle() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(
            s.clone(),
            WorkRestOptions {
                max_rounds: Some(1),
                ..Default::default()
            },
        );
        work_for(&mut engine, &s, 300);
        s.advance(PRE_REST_DELAY_MS);
        engine.tick();
        let events = engine.skip_rest();

        assert_eq!(engine.rounds(), 1);
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(events.iter().any(|e| matches!(e, Event::SessionCompleted { .. })));
    }

    #[test]
    fn stop_rest_does_not_count_round() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 100);
        work_for(&mut engine, &s, 1_000);
        s.advance(PRE_REST_DELAY_MS);
        engine.tick();

        engine.stop_rest();
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.rounds(), 0);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn ratio_is_fixed_point() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(s.clone(), WorkRestOptions::default());
        engine.set_ratio(2.5);
        assert_eq!(engine.ratio(), 250);
        engine.adjust_ratio(1);
        assert_eq!(engine.ratio(), 251);

        for _ in 0..37 {
            engine.adjust_ratio(10);
        }
        for _ in 0..37 {
            engine.adjust_ratio(-10);
        }
        assert_eq!(engine.ratio(), 251);

        engine.reset_ratio();
        assert_eq!(engine.ratio(), 100);
    }

    #[test]
    fn configuration_is_locked_outside_idle() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(s.clone(), WorkRestOptions::default());
        engine.start_work();
        engine.set_ratio(3.0);
        engine.adjust_ratio(50);
        engine.set_max_rounds(3);
        engine.set_rest_mode(RestMode::Fixed);
        assert_eq!(engine.ratio(), DEFAULT_RATIO);
        assert_eq!(engine.max_rounds(), DEFAULT_MAX_ROUNDS);
        assert_eq!(engine.rest_mode(), RestMode::Ratio);
    }

    #[test]
    fn clamps_ratio_and_rounds() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(s.clone(), WorkRestOptions::default());
        engine.set_ratio(500.0);
        assert_eq!(engine.ratio(), MAX_RATIO);
        engine.set_ratio(0.0);
        assert_eq!(engine.ratio(), MIN_RATIO);
        engine.set_max_rounds(0);
        assert_eq!(engine.max_rounds(), MIN_ROUNDS);
        engine.set_max_rounds(5_000);
        assert_eq!(engine.max_rounds(), MAX_ROUNDS);
    }

    #[test]
    fn fixed_mode_ignores_work_length() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(
            s.clone(),
            WorkRestOptions {
                rest_mode: Some(RestMode::Fixed),
                fixed_rest_secs: Some(15),
                ..Default::default()
            },
        );
        work_for(&mut engine, &s, 90_000);
        s.advance(PRE_REST_DELAY_MS);
        engine.tick();
        assert_eq!(engine.state().current_time_ms, 15_000);
    }

    #[test]
    fn rest_is_capped_at_the_ceiling() {
        assert_eq!(rest_duration_ms(10_000, RestMode::Ratio, 10_000, 0, 60_000), 60_000);
        assert_eq!(rest_duration_ms(0, RestMode::Fixed, 100, 120, 60_000), 60_000);
        assert_eq!(rest_duration_ms(3, RestMode::Ratio, 50, 0, 60_000), 2);
        assert_eq!(rest_duration_ms(1, RestMode::Ratio, 49, 0, 60_000), 0);
    }

    #[test]
    fn work_ceiling_stops_work() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(
            s.clone(),
            WorkRestOptions {
                max_work_time_ms: Some(2_000),
                ..Default::default()
            },
        );
        engine.start_work();
        s.advance(2_500);
        let events = engine.tick();
        assert!(events.iter().any(|e| matches!(e, Event::LapRecorded { elapsed_ms: 2_000, .. })));
        assert!(engine.is_rest_pending());
    }

    #[test]
    fn pause_and_resume_only_in_work() {
        let s = ManualScheduler::shared();
        let mut engine = WorkRestEngine::new(s.clone(), WorkRestOptions::default());
        assert!(engine.pause_work().is_empty());

        engine.start_work();
        s.advance(300);
        engine.pause_work();
        assert_eq!(engine.state().state, TimerState::Paused);
        s.advance(10_000);
        engine.resume_work();
        s.advance(200);
        engine.tick();
        assert_eq!(engine.state().current_time_ms, 500);
    }

    #[test]
    fn reset_cancels_pending_rest() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 300);
        work_for(&mut engine, &s, 700);
        assert!(engine.is_rest_pending());

        engine.reset();
        assert_eq!(s.pending(), 0);
        assert_eq!(engine.state().phase, Phase::Idle);
        assert_eq!(engine.ratio(), DEFAULT_RATIO);

        s.advance(PRE_REST_DELAY_MS);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn stop_rest_aborts_pending_rest() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 100);
        work_for(&mut engine, &s, 500);
        assert!(engine.is_rest_pending());

        let events = engine.stop_rest();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::PhaseChanged { from: Phase::Work, to: Phase::Idle, .. }
        )));
        assert!(!engine.is_rest_pending());
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.rounds(), 0);
        assert_eq!(s.pending(), 0);

        s.advance(PRE_REST_DELAY_MS);
        assert!(engine.tick().is_empty());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn skip_rest_during_delay_counts_round() {
        let s = ManualScheduler::shared();
        let mut engine = engine_with_ratio(&s, 100);
        work_for(&mut engine, &s, 500);

        engine.skip_rest();
        assert!(!engine.is_rest_pending());
        assert_eq!(engine.rounds(), 1);
        assert_eq!(engine.phase(), Phase::Work);
        assert_eq!(engine.state().state, TimerState::Running);

        s.advance(PRE_REST_DELAY_MS);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Work);
    }

    #[test]
    fn laps_are_reported() {
        let s = ManualScheduler::shared();
        let laps = Rc::new(RefCell::new(Vec::new()));
        let l = laps.clone();
        let mut engine = WorkRestEngine::with_callbacks(
            s.clone(),
            WorkRestOptions::default(),
            WorkRestCallbacks::default().on_lap_recorded(move |ms| l.borrow_mut().push(ms)),
        );
        work_for(&mut engine, &s, 1_234);
        s.advance(PRE_REST_DELAY_MS);
        engine.tick();
        engine.skip_rest();
        s.advance(800);
        engine.stop_work();
        assert_eq!(*laps.borrow(), vec![1_234, 800]);
    }

    proptest! {
        #[test]
        fn adjust_ratio_stays_in_domain(deltas in proptest::collection::vec(-20_000i32..20_000, 0..30)) {
            let s = ManualScheduler::shared();
            let mut engine = WorkRestEngine::new(s.clone(), WorkRestOptions::default());
            for d in deltas {
                engine.adjust_ratio(d);
                prop_assert!((MIN_RATIO..=MAX_RATIO).contains(&engine.ratio()));
            }
        }
    }
}
