//! Tone synthesis: one oscillator through one gain envelope.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE: u32 = 44_100;
const ATTACK_MS: f32 = 5.0;
/// Level the release ramps down to; an exponential ramp cannot reach zero.
const RELEASE_FLOOR: f32 = 0.001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    /// Oscillator value at `phase` in cycles (only the fractional part matters).
    pub fn sample(self, phase: f32) -> f32 {
        let p = phase.fract();
        match self {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * p - 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub waveform: Waveform,
    /// Peak gain before the engine volume is applied.
    pub gain: f32,
    /// Offset from the moment the tone is scheduled.
    pub delay_ms: u32,
}

impl Tone {
    pub fn new(frequency_hz: f32, duration_ms: u32, waveform: Waveform) -> Self {
        Self {
            frequency_hz,
            duration_ms,
            waveform,
            gain: 0.3,
            delay_ms: 0,
        }
    }

    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Gain multiplier `t_ms` into a tone of `duration_ms`: a short linear attack
/// followed by an exponential release to [`RELEASE_FLOOR`].
pub fn envelope(t_ms: f32, duration_ms: f32) -> f32 {
    if duration_ms <= 0.0 || t_ms < 0.0 || t_ms >= duration_ms {
        return 0.0;
    }
    let attack = ATTACK_MS.min(duration_ms / 4.0);
    if t_ms < attack {
        return t_ms / attack;
    }
    let release = duration_ms - attack;
    let progress = (t_ms - attack) / release;
    RELEASE_FLOOR.powf(progress)
}

/// Render `tone` (without its delay) as mono f32 samples.
pub fn render_tone(tone: &Tone, volume: f32, sample_rate: u32) -> Vec<f32> {
    let len = (tone.duration_ms as u64 * sample_rate as u64 / 1000) as usize;
    let peak = (tone.gain * volume).clamp(0.0, 1.0);
    let duration = tone.duration_ms as f32;
    (0..len)
        .map(|i| {
            let t_secs = i as f32 / sample_rate as f32;
            let osc = tone.waveform.sample(tone.frequency_hz * t_secs);
            osc * peak * envelope(t_secs * 1000.0, duration)
        })
        .collect()
}

/// Sum `samples` into `buffer` starting at `offset`, growing it as needed.
pub fn mix_into(buffer: &mut Vec<f32>, offset: usize, samples: &[f32]) {
    let end = offset + samples.len();
    if buffer.len() < end {
        buffer.resize(end, 0.0);
    }
    for (dst, src) in buffer[offset..end].iter_mut().zip(samples) {
        *dst = (*dst + src).clamp(-1.0, 1.0);
    }
}
