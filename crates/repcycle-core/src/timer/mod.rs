mod clock;
pub mod scheduler;
mod sequence;
mod stopwatch;
mod work_rest;

pub use clock::{Clock, ClockCallbacks, TimerState};
pub use scheduler::{FrameToken, ManualScheduler, Scheduler, SharedScheduler, SystemScheduler, TimeSource};
pub use sequence::{
    IntervalPlan, Sequence, SequencerCallbacks, Step, StepCallback, StepReport, StepSequencer,
    StepTransition,
};
pub use stopwatch::{Stopwatch, StopwatchCallbacks, UNBOUNDED_MS};
pub use work_rest::{
    clamp_ratio, clamp_rounds, rest_duration_ms, Phase, RestMode, WorkRestCallbacks,
    WorkRestEngine, WorkRestOptions, WorkRestState, DEFAULT_FIXED_REST_SECS, DEFAULT_MAX_ROUNDS,
    DEFAULT_RATIO, MAX_RATIO, MAX_ROUNDS, MIN_RATIO, MIN_ROUNDS, PRE_REST_DELAY_MS,
};
