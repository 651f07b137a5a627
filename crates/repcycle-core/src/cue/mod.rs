mod engine;
mod manager;
mod synth;

use serde::{Deserialize, Serialize};

pub use engine::{AudioOutput, NullOutput, PcmOutput, PlayedTone, SharedSoundEngine, SoundEngine};
pub use manager::{SoundManager, SoundManagerConfig, MAX_COUNTDOWN_BEEPS};
pub use synth::{envelope, mix_into, render_tone, Tone, Waveform, SAMPLE_RATE};

/// One discrete audio event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Start,
    Finish,
    IntervalStart,
    IntervalEnd,
    /// Seconds left when the beep fired.
    Countdown(u32),
}
