//! Ordered, repeatable playback of timed steps.
//!
//! Each step is played by a fresh [`Clock`]. When a step ends, naturally or
//! by `skip_current_step()`, the next one starts in the same call so there is
//! no gap between steps.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::{Clock, TimerState};
use super::scheduler::SharedScheduler;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepTransition {
    Start,
    Pause,
    Resume,
    Complete,
    Skip,
}

/// What a step callback is told about the step at a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub elapsed_ms: i64,
}

type StepFn = dyn FnMut(StepTransition, StepReport);

/// Per-step lifecycle observer. Cloning shares the same closure.
#[derive(Clone)]
pub struct StepCallback(Rc<RefCell<StepFn>>);

impl StepCallback {
    pub fn new(f: impl FnMut(StepTransition, StepReport) + 'static) -> Self {
        Self(Rc::new(RefCell::new(f)))
    }

    fn call(&self, transition: StepTransition, report: StepReport) {
        (self.0.borrow_mut())(transition, report);
    }
}

impl fmt::Debug for StepCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StepCallback")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub duration_ms: i64,
    pub label: String,
    #[serde(default)]
    pub is_work: Option<bool>,
    #[serde(skip)]
    pub on_transition: Option<StepCallback>,
}

impl Step {
    pub fn new(id: impl Into<String>, label: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            id: id.into(),
            duration_ms,
            label: label.into(),
            is_work: None,
            on_transition: None,
        }
    }

    pub fn work(id: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            is_work: Some(true),
            ..Self::new(id, "Work", duration_ms)
        }
    }

    pub fn rest(id: impl Into<String>, duration_ms: i64) -> Self {
        Self {
            is_work: Some(false),
            ..Self::new(id, "Rest", duration_ms)
        }
    }

    pub fn with_callback(mut self, callback: StepCallback) -> Self {
        self.on_transition = Some(callback);
        self
    }

    pub fn is_work(&self) -> bool {
        self.is_work.unwrap_or(false)
    }

    fn notify(&self, transition: StepTransition, elapsed_ms: i64) {
        if let Some(cb) = &self.on_transition {
            cb.call(transition, StepReport { elapsed_ms });
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sequence {
    pub steps: Vec<Step>,
    /// Number of passes through `steps`; 0 repeats forever.
    #[serde(default)]
    pub repeat: u32,
}

impl Sequence {
    pub fn new(steps: Vec<Step>, repeat: u32) -> Self {
        Self { steps, repeat }
    }

    /// Duration of one pass in milliseconds.
    pub fn pass_duration_ms(&self) -> i64 {
        self.steps.iter().map(|s| s.duration_ms.max(0)).sum()
    }

    pub fn work_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_work()).count()
    }
}

/// Work/rest interval settings that expand into a [`Sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalPlan {
    pub work_ms: i64,
    pub rest_ms: i64,
    pub sets: u32,
    #[serde(default)]
    pub skip_last_rest: bool,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

impl IntervalPlan {
    pub fn into_sequence(self) -> Sequence {
        let mut steps = Vec::with_capacity(self.sets as usize * 2);
        for set in 1..=self.sets {
            steps.push(Step {
                label: format!("Work {set}"),
                ..Step::work(format!("work-{set}"), self.work_ms)
            });
            let last = set == self.sets;
            if !(last && self.skip_last_rest) {
                steps.push(Step {
                    label: format!("Rest {set}"),
                    ..Step::rest(format!("rest-{set}"), self.rest_ms)
                });
            }
        }
        Sequence::new(steps, self.repeat)
    }
}

#[derive(Default)]
pub struct SequencerCallbacks {
    pub on_step_change: Option<Box<dyn FnMut(&Step, usize)>>,
    pub on_sequence_complete: Option<Box<dyn FnMut()>>,
}

impl SequencerCallbacks {
    pub fn on_step_change(mut self, f: impl FnMut(&Step, usize) + 'static) -> Self {
        self.on_step_change = Some(Box::new(f));
        self
    }

    pub fn on_sequence_complete(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_sequence_complete = Some(Box::new(f));
        self
    }
}

pub struct StepSequencer {
    scheduler: SharedScheduler,
    sequence: Sequence,
    callbacks: SequencerCallbacks,
    step_index: usize,
    repeat_index: u32,
    clock: Option<Clock>,
    state: TimerState,
}

impl StepSequencer {
    pub fn new(scheduler: SharedScheduler, sequence: Sequence) -> Self {
        Self::with_callbacks(scheduler, sequence, SequencerCallbacks::default())
    }

    pub fn with_callbacks(
        scheduler: SharedScheduler,
        sequence: Sequence,
        callbacks: SequencerCallbacks,
    ) -> Self {
        Self {
            scheduler,
            sequence,
            callbacks,
            step_index: 0,
            repeat_index: 0,
            clock: None,
            state: TimerState::Idle,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn repeat_index(&self) -> u32 {
        self.repeat_index
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.sequence.steps.get(self.step_index)
    }

    /// Remaining time of the current step; the full duration before it
    /// starts and 0 once the sequence has completed.
    pub fn remaining_ms(&self) -> i64 {
        if self.state == TimerState::Completed {
            return 0;
        }
        match &self.clock {
            Some(clock) => clock.time(),
            None => self.current_step().map(|s| s.duration_ms.max(0)).unwrap_or(0),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        match self.state {
            TimerState::Paused => {
                if let Some(clock) = self.clock.as_mut() {
                    events.extend(clock.start());
                    self.state = TimerState::Running;
                    self.notify_current(StepTransition::Resume, &mut events);
                }
            }
            TimerState::Idle => {
                if self.sequence.steps.is_empty() {
                    return events;
                }
                self.state = TimerState::Running;
                self.begin_step(&mut events);
            }
            TimerState::Running | TimerState::Completed => {}
        }
        events
    }

    pub fn pause(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != TimerState::Running {
            return events;
        }
        if let Some(clock) = self.clock.as_mut() {
            events.extend(clock.pause());
        }
        self.state = TimerState::Paused;
        self.notify_current(StepTransition::Pause, &mut events);
        events
    }

    pub fn reset(&mut self) {
        self.drop_clock();
        self.step_index = 0;
        self.repeat_index = 0;
        self.state = TimerState::Idle;
    }

    /// Replace the step list. The sequencer starts over from the first step.
    pub fn set_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
        self.reset();
    }

    /// End the active step now, report how long it actually ran and move on.
    pub fn skip_current_step(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if !self.state.is_active() {
            return events;
        }
        let Some(mut clock) = self.clock.take() else {
            return events;
        };
        clock.pause();
        let elapsed = clock.total_elapsed().max(0);
        clock.destroy();

        self.report(StepTransition::Skip, elapsed, &mut events);
        self.advance(&mut events);
        events
    }

    /// Forward a due frame to the active step's clock.
    pub fn tick(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != TimerState::Running {
            return events;
        }
        let completed = match self.clock.as_mut() {
            Some(clock) => clock.tick().is_some(),
            None => false,
        };
        if completed {
            self.drop_clock();
            let full = self.current_step().map(|s| s.duration_ms.max(0)).unwrap_or(0);
            self.report(StepTransition::Complete, full, &mut events);
            self.advance(&mut events);
        }
        events
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_step(&mut self, events: &mut Vec<Event>) {
        let Some(step) = self.sequence.steps.get(self.step_index) else {
            return;
        };
        let mut clock = Clock::new(self.scheduler.clone(), step.duration_ms);
        clock.start();
        self.clock = Some(clock);

        debug!(
            step_index = self.step_index,
            repeat_index = self.repeat_index,
            step_id = %step.id,
            "step started"
        );
        events.push(Event::StepStarted {
            step_index: self.step_index,
            repeat_index: self.repeat_index,
            step_id: step.id.clone(),
            label: step.label.clone(),
            duration_ms: step.duration_ms,
            at: Utc::now(),
        });
        if let Some(cb) = self.callbacks.on_step_change.as_mut() {
            cb(step, self.step_index);
        }
        step.notify(StepTransition::Start, 0);
    }

    fn advance(&mut self, events: &mut Vec<Event>) {
        self.step_index += 1;
        if self.step_index >= self.sequence.steps.len() {
            self.step_index = 0;
            self.repeat_index += 1;
            let repeat = self.sequence.repeat;
            if repeat > 0 && self.repeat_index >= repeat {
                self.state = TimerState::Completed;
                debug!(repeats = self.repeat_index, "sequence completed");
                events.push(Event::SequenceCompleted {
                    repeats: self.repeat_index,
                    at: Utc::now(),
                });
                if let Some(cb) = self.callbacks.on_sequence_complete.as_mut() {
                    cb();
                }
                return;
            }
        }
        self.state = TimerState::Running;
        self.begin_step(events);
    }

    fn report(&self, transition: StepTransition, elapsed_ms: i64, events: &mut Vec<Event>) {
        let Some(step) = self.current_step() else {
            return;
        };
        events.push(Event::StepTransitioned {
            step_index: self.step_index,
            step_id: step.id.clone(),
            transition,
            elapsed_ms,
            at: Utc::now(),
        });
        step.notify(transition, elapsed_ms);
    }

    fn notify_current(&self, transition: StepTransition, events: &mut Vec<Event>) {
        let elapsed = self
            .clock
            .as_ref()
            .map(|c| c.total_elapsed().max(0))
            .unwrap_or(0);
        self.report(transition, elapsed, events);
    }

    fn drop_clock(&mut self) {
        if let Some(mut clock) = self.clock.take() {
            clock.destroy();
        }
    }
}

impl fmt::Debug for StepSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSequencer")
            .field("steps", &self.sequence.steps.len())
            .field("repeat", &self.sequence.repeat)
            .field("step_index", &self.step_index)
            .field("repeat_index", &self.repeat_index)
            .field("state", &self.state)
            .finish()
    }
}
