//! Maps timer snapshots onto audio cues.
//!
//! Hosts call one of the `sync_*` methods on every frame with the timer's
//! current state. The manager remembers the previous snapshot and plays a cue
//! only when something actually changed. Because frames arrive far more often
//! than once per second, no two cues are allowed in the same wall-clock
//! second.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::engine::SharedSoundEngine;
use super::Cue;
use crate::timer::{Phase, TimeSource, TimerState};

pub const MAX_COUNTDOWN_BEEPS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundManagerConfig {
    pub enabled: bool,
    /// 0.0 ..= 1.0
    pub volume: f32,
    /// Beep during the last N whole seconds; 0 turns countdown beeps off.
    pub countdown_beeps: u32,
    pub start_cue: bool,
    pub finish_cue: bool,
    pub interval_cues: bool,
    pub countdown_cues: bool,
}

impl Default for SoundManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.5,
            countdown_beeps: 3,
            start_cue: true,
            finish_cue: true,
            interval_cues: true,
            countdown_cues: true,
        }
    }
}

impl SoundManagerConfig {
    /// Bring every field into its domain.
    pub fn validated(mut self) -> Self {
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            Self::default().volume
        };
        self.countdown_beeps = self.countdown_beeps.min(MAX_COUNTDOWN_BEEPS);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Snapshot {
    state: TimerState,
    value_ms: i64,
    step_index: Option<usize>,
    is_work: Option<bool>,
    phase: Option<Phase>,
}

impl Snapshot {
    fn new(state: TimerState, value_ms: i64) -> Self {
        Self {
            state,
            value_ms,
            step_index: None,
            is_work: None,
            phase: None,
        }
    }
}

pub struct SoundManager {
    engine: SharedSoundEngine,
    time: Rc<dyn TimeSource>,
    config: SoundManagerConfig,
    prev: Option<Snapshot>,
    last_countdown_second: Option<u32>,
    last_cue_second: Option<u64>,
    on_countdown_tick: Option<Box<dyn FnMut(u32)>>,
}

impl SoundManager {
    pub fn new(
        engine: SharedSoundEngine,
        time: Rc<dyn TimeSource>,
        config: SoundManagerConfig,
    ) -> Self {
        let mut manager = Self {
            engine,
            time,
            config: SoundManagerConfig::default(),
            prev: None,
            last_countdown_second: None,
            last_cue_second: None,
            on_countdown_tick: None,
        };
        manager.set_config(config);
        manager
    }

    /// Called once per countdown second inside the beep window, with the
    /// number of seconds left.
    pub fn on_countdown_tick(mut self, f: impl FnMut(u32) + 'static) -> Self {
        self.on_countdown_tick = Some(Box::new(f));
        self
    }

    pub fn config(&self) -> &SoundManagerConfig {
        &self.config
    }

    /// Unlock the shared audio output. Call once after a user gesture.
    pub fn init(&mut self) -> bool {
        self.engine.borrow_mut().init()
    }

    /// Enable and volume are global to the shared engine: the last call wins.
    pub fn set_config(&mut self, config: SoundManagerConfig) {
        self.config = config.validated();
        let mut engine = self.engine.borrow_mut();
        engine.set_enabled(self.config.enabled);
        engine.set_volume(self.config.volume);
    }

    /// Forget every previous snapshot, e.g. when the timer session changes.
    pub fn reset(&mut self) {
        self.prev = None;
        self.last_countdown_second = None;
        self.last_cue_second = None;
    }

    pub fn sync_countdown(&mut self, state: TimerState, remaining_ms: i64) -> Vec<Cue> {
        let mut cues = Vec::new();
        let prev = self.prev.replace(Snapshot::new(state, remaining_ms));
        if prev.is_some_and(|p| remaining_ms > p.value_ms) {
            self.last_countdown_second = None;
        }
        self.lifecycle_cues(prev.map(|p| p.state), state, &mut cues);
        if state == TimerState::Running {
            self.countdown(remaining_ms, &mut cues);
        }
        cues
    }

    pub fn sync_stopwatch(
        &mut self,
        state: TimerState,
        elapsed_ms: i64,
        limit_ms: Option<i64>,
    ) -> Vec<Cue> {
        let mut cues = Vec::new();
        let prev = self.prev.replace(Snapshot::new(state, elapsed_ms));
        if prev.is_some_and(|p| elapsed_ms < p.value_ms) {
            self.last_countdown_second = None;
        }
        self.lifecycle_cues(prev.map(|p| p.state), state, &mut cues);
        if let (TimerState::Running, Some(limit)) = (state, limit_ms) {
            self.countdown(limit - elapsed_ms, &mut cues);
        }
        cues
    }

    pub fn sync_interval(
        &mut self,
        state: TimerState,
        remaining_ms: i64,
        step_index: usize,
        is_work: bool,
    ) -> Vec<Cue> {
        let mut cues = Vec::new();
        let prev = self.prev.replace(Snapshot {
            step_index: Some(step_index),
            is_work: Some(is_work),
            ..Snapshot::new(state, remaining_ms)
        });

        if let Some(p) = prev {
            if p.step_index != Some(step_index) || remaining_ms > p.value_ms {
                self.last_countdown_second = None;
            }
        }
        self.lifecycle_cues(prev.map(|p| p.state), state, &mut cues);

        let flipped = prev.is_some_and(|p| p.is_work.is_some_and(|w| w != is_work));
        if state == TimerState::Running && flipped && self.config.interval_cues {
            let cue = if is_work {
                Cue::IntervalStart
            } else {
                Cue::IntervalEnd
            };
            self.play(cue, &mut cues);
        }
        if state == TimerState::Running {
            self.countdown(remaining_ms, &mut cues);
        }
        cues
    }

    /// `time_ms` is elapsed work during Work and remaining rest during Rest.
    pub fn sync_work_rest(&mut self, state: TimerState, phase: Phase, time_ms: i64) -> Vec<Cue> {
        let mut cues = Vec::new();
        let prev = self.prev.replace(Snapshot {
            phase: Some(phase),
            ..Snapshot::new(state, time_ms)
        });
        let prev_phase = prev.and_then(|p| p.phase);

        if let Some(p) = prev {
            let regressed = match phase {
                Phase::Rest => time_ms > p.value_ms,
                Phase::Work | Phase::Idle => time_ms < p.value_ms,
            };
            if regressed || p.phase != Some(phase) {
                self.last_countdown_second = None;
            }
        }

        match (prev_phase, phase) {
            (None | Some(Phase::Idle), Phase::Work) if state == TimerState::Running => {
                if self.config.start_cue {
                    self.play(Cue::Start, &mut cues);
                }
            }
            (Some(Phase::Work), Phase::Rest) => {
                if self.config.interval_cues {
                    self.play(Cue::IntervalEnd, &mut cues);
                }
            }
            (Some(Phase::Rest), Phase::Work) => {
                if self.config.interval_cues {
                    self.play(Cue::IntervalStart, &mut cues);
                }
            }
            (Some(Phase::Rest), Phase::Idle) => {
                if self.config.finish_cue {
                    self.play(Cue::Finish, &mut cues);
                }
            }
            _ => {}
        }

        if phase == Phase::Rest && state == TimerState::Running {
            self.countdown(time_ms, &mut cues);
        }
        cues
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lifecycle_cues(&mut self, prev: Option<TimerState>, state: TimerState, cues: &mut Vec<Cue>) {
        let fresh_start = matches!(
            prev,
            None | Some(TimerState::Idle) | Some(TimerState::Completed)
        );
        if state == TimerState::Running && fresh_start && self.config.start_cue {
            self.play(Cue::Start, cues);
        }
        let just_finished = prev.is_some_and(|p| p != TimerState::Completed);
        if state == TimerState::Completed && just_finished {
            self.last_countdown_second = None;
            if self.config.finish_cue {
                self.play(Cue::Finish, cues);
            }
        }
    }

    fn countdown(&mut self, remaining_ms: i64, cues: &mut Vec<Cue>) {
        let window = self.config.countdown_beeps;
        if window == 0 || remaining_ms <= 0 {
            return;
        }
        let seconds_left = u32::try_from((remaining_ms + 999) / 1000).unwrap_or(u32::MAX);
        if seconds_left > window || self.last_countdown_second == Some(seconds_left) {
            return;
        }
        self.last_countdown_second = Some(seconds_left);
        if let Some(cb) = self.on_countdown_tick.as_mut() {
            cb(seconds_left);
        }
        if self.config.countdown_cues {
            self.play(Cue::Countdown(seconds_left), cues);
        }
    }

    fn play(&mut self, cue: Cue, cues: &mut Vec<Cue>) {
        if !self.config.enabled {
            return;
        }
        let second = self.time.now_ms() / 1000;
        if self.last_cue_second == Some(second) {
            trace!(?cue, second, "cue suppressed, one already played this second");
            return;
        }
        if self.engine.borrow_mut().play_cue(cue) {
            debug!(?cue, "cue played");
            self.last_cue_second = Some(second);
            cues.push(cue);
        }
    }
}

impl fmt::Debug for SoundManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundManager")
            .field("config", &self.config)
            .field("prev", &self.prev)
            .field("last_countdown_second", &self.last_countdown_second)
            .field("last_cue_second", &self.last_cue_second)
            .finish()
    }
}
