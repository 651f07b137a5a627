//! # Repcycle Core Library
//!
//! Timing engine for workout timers. The library owns no thread and no
//! event loop: every component is driven by a [`Scheduler`] that the host
//! polls, so the same code runs under a terminal loop, a GUI frame callback
//! or a test that advances a manual clock.
//!
//! ## Architecture
//!
//! - **Clock**: countdown primitive that measures real elapsed time per frame
//! - **Stopwatch**: counts up by wrapping a clock started at its bound
//! - **StepSequencer**: runs an ordered list of timed steps, optionally repeated
//! - **WorkRestEngine**: work phases of open length followed by proportional rests
//! - **Cues**: synthesized tones and the policy deciding when they play
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Clock`]: countdown state machine
//! - [`StepSequencer`]: interval and circuit runner
//! - [`WorkRestEngine`]: ratio-based rest controller
//! - [`SoundManager`]: cue policy over a [`SoundEngine`]
//! - [`Config`]: application configuration management

pub mod cue;
pub mod error;
pub mod events;
pub mod storage;
pub mod timer;

pub use cue::{Cue, SoundEngine, SoundManager, SoundManagerConfig};
pub use error::{AudioError, ConfigError, CoreError};
pub use events::Event;
pub use storage::Config;
pub use timer::{
    Clock, IntervalPlan, ManualScheduler, Phase, RestMode, Scheduler, Sequence, SharedScheduler,
    Step, StepSequencer, Stopwatch, SystemScheduler, TimerState, WorkRestEngine, WorkRestOptions,
};
