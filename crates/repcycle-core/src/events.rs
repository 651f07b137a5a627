use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cue::Cue;
use crate::timer::{Phase, StepTransition, TimerState};

/// Every state change in the engine produces an Event.
/// Hosts print or forward them; the engine itself never stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ClockStarted {
        initial_ms: i64,
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    ClockPaused {
        remaining_ms: i64,
        at: DateTime<Utc>,
    },
    ClockReset {
        initial_ms: i64,
        at: DateTime<Utc>,
    },
    ClockCompleted {
        initial_ms: i64,
        at: DateTime<Utc>,
    },
    StopwatchStopped {
        elapsed_ms: i64,
        at: DateTime<Utc>,
    },
    StepStarted {
        step_index: usize,
        repeat_index: u32,
        step_id: String,
        label: String,
        duration_ms: i64,
        at: DateTime<Utc>,
    },
    /// A step left the Running/Paused cycle: paused, resumed, completed or skipped.
    StepTransitioned {
        step_index: usize,
        step_id: String,
        transition: StepTransition,
        elapsed_ms: i64,
        at: DateTime<Utc>,
    },
    SequenceCompleted {
        repeats: u32,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        state: TimerState,
        at: DateTime<Utc>,
    },
    LapRecorded {
        elapsed_ms: i64,
        at: DateTime<Utc>,
    },
    RestScheduled {
        rest_ms: i64,
        starts_in_ms: u64,
        at: DateTime<Utc>,
    },
    RoundCompleted {
        rounds: u32,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        rounds: u32,
        at: DateTime<Utc>,
    },
    CuePlayed {
        cue: Cue,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Option<Phase>,
        time_ms: i64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ClockStarted { .. } => "clock_started",
            Event::ClockPaused { .. } => "clock_paused",
            Event::ClockReset { .. } => "clock_reset",
            Event::ClockCompleted { .. } => "clock_completed",
            Event::StopwatchStopped { .. } => "stopwatch_stopped",
            Event::StepStarted { .. } => "step_started",
            Event::StepTransitioned { .. } => "step_transitioned",
            Event::SequenceCompleted { .. } => "sequence_completed",
            Event::PhaseChanged { .. } => "phase_changed",
            Event::LapRecorded { .. } => "lap_recorded",
            Event::RestScheduled { .. } => "rest_scheduled",
            Event::RoundCompleted { .. } => "round_completed",
            Event::SessionCompleted { .. } => "session_completed",
            Event::CuePlayed { .. } => "cue_played",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serde_tag() {
        let events = [
            Event::ClockPaused {
                remaining_ms: 10,
                at: Utc::now(),
            },
            Event::LapRecorded {
                elapsed_ms: 500,
                at: Utc::now(),
            },
            Event::PhaseChanged {
                from: Phase::Work,
                to: Phase::Rest,
                state: TimerState::Running,
                at: Utc::now(),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }
}
