//! Audio output capability and the cue presets built on it.
//!
//! An application has one physical output, so one [`SoundEngine`] is built
//! per process and shared between every [`SoundManager`] as a
//! [`SharedSoundEngine`]. Outputs start locked: nothing is audible until
//! `init()` has been called once after a user gesture.
//!
//! [`SoundManager`]: super::SoundManager

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, warn};

use super::synth::{mix_into, render_tone, Tone, Waveform, SAMPLE_RATE};
use super::Cue;
use crate::error::{AudioError, CoreError};
use crate::timer::TimeSource;

/// Something that can make a tone audible.
pub trait AudioOutput {
    fn is_supported(&self) -> bool {
        true
    }

    /// Unlock the output. Called once per session by [`SoundEngine::init`].
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Schedule one enveloped tone, `tone.delay_ms` from now.
    fn play(&mut self, tone: &Tone, volume: f32);
}

/// Output that accepts everything and plays nothing.
#[derive(Debug, Clone, Copy)]
pub struct NullOutput {
    supported: bool,
}

impl NullOutput {
    pub fn new() -> Self {
        Self { supported: true }
    }

    /// An environment with no audio at all.
    pub fn unsupported() -> Self {
        Self { supported: false }
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullOutput {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.supported {
            Ok(())
        } else {
            Err(AudioError::Unsupported)
        }
    }

    fn play(&mut self, _tone: &Tone, _volume: f32) {}
}

/// A tone as it landed on the [`PcmOutput`] timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayedTone {
    pub at_ms: u64,
    pub tone: Tone,
    pub volume: f32,
}

/// One rendered tone, kept apart until the track is mixed down.
#[derive(Debug)]
struct Chunk {
    at_ms: u64,
    samples: Vec<f32>,
}

#[derive(Debug, Default)]
struct PcmTrack {
    chunks: Vec<Chunk>,
    played: Vec<PlayedTone>,
}

/// Renders every tone into an in-memory mono track, positioned by the time
/// source. Cloning yields another handle to the same track.
///
/// Only the tones themselves are held in memory. The silence between them
/// exists only in [`samples`](Self::samples) and the WAV file, and can be
/// shortened with [`with_max_gap`](Self::with_max_gap).
#[derive(Clone)]
pub struct PcmOutput {
    time: Rc<dyn TimeSource>,
    origin_ms: u64,
    sample_rate: u32,
    max_gap_ms: Option<u64>,
    track: Rc<RefCell<PcmTrack>>,
}

impl PcmOutput {
    pub fn new(time: Rc<dyn TimeSource>) -> Self {
        Self::with_sample_rate(time, SAMPLE_RATE)
    }

    pub fn with_sample_rate(time: Rc<dyn TimeSource>, sample_rate: u32) -> Self {
        let origin_ms = time.now_ms();
        Self {
            time,
            origin_ms,
            sample_rate,
            max_gap_ms: None,
            track: Rc::new(RefCell::new(PcmTrack::default())),
        }
    }

    /// Shorten any stretch of silence, leading silence included, to at most
    /// `max_gap_ms` when the track is mixed down. `played()` keeps the real
    /// timestamps.
    pub fn with_max_gap(mut self, max_gap_ms: u64) -> Self {
        self.max_gap_ms = Some(max_gap_ms);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn played(&self) -> Vec<PlayedTone> {
        self.track.borrow().played.clone()
    }

    /// Mix every tone onto one timeline.
    pub fn samples(&self) -> Vec<f32> {
        let track = self.track.borrow();
        let mut chunks: Vec<&Chunk> = track.chunks.iter().collect();
        chunks.sort_by_key(|c| c.at_ms);

        let rate = self.sample_rate as u64;
        let mut buffer = Vec::new();
        let mut shift_ms = 0;
        let mut audible_until_ms = 0;
        for chunk in chunks {
            if let Some(max_gap) = self.max_gap_ms {
                let gap = chunk.at_ms.saturating_sub(audible_until_ms);
                shift_ms += gap.saturating_sub(max_gap);
            }
            let offset = ((chunk.at_ms - shift_ms) * rate / 1000) as usize;
            mix_into(&mut buffer, offset, &chunk.samples);
            let len_ms = chunk.samples.len() as u64 * 1000 / rate;
            audible_until_ms = audible_until_ms.max(chunk.at_ms + len_ms);
        }
        buffer
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples().len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Write the track as a 32-bit float mono WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), CoreError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for sample in self.samples() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        debug!(path = %path.display(), "cue track written");
        Ok(())
    }
}

impl std::fmt::Debug for PcmOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let track = self.track.borrow();
        f.debug_struct("PcmOutput")
            .field("sample_rate", &self.sample_rate)
            .field("max_gap_ms", &self.max_gap_ms)
            .field("chunks", &track.chunks.len())
            .field("played", &track.played.len())
            .finish()
    }
}

impl AudioOutput for PcmOutput {
    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self, tone: &Tone, volume: f32) {
        let at_ms = self.time.now_ms().saturating_sub(self.origin_ms) + tone.delay_ms as u64;
        let samples = render_tone(tone, volume, self.sample_rate);
        let mut track = self.track.borrow_mut();
        track.chunks.push(Chunk { at_ms, samples });
        track.played.push(PlayedTone {
            at_ms,
            tone: *tone,
            volume,
        });
    }
}

/// The one audio graph of the process: output + global enable/volume.
pub struct SoundEngine {
    output: Box<dyn AudioOutput>,
    initialized: bool,
    enabled: bool,
    volume: f32,
}

pub type SharedSoundEngine = Rc<RefCell<SoundEngine>>;

impl SoundEngine {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            initialized: false,
            enabled: true,
            volume: 0.5,
        }
    }

    pub fn shared(output: Box<dyn AudioOutput>) -> SharedSoundEngine {
        Rc::new(RefCell::new(Self::new(output)))
    }

    pub fn is_supported(&self) -> bool {
        self.output.is_supported()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Unlock the output. Must run once, after a user gesture, before any
    /// tone is audible. Returns whether the engine is ready.
    pub fn init(&mut self) -> bool {
        if !self.is_supported() {
            warn!("audio output not supported, cues disabled");
            return false;
        }
        if self.initialized {
            return true;
        }
        match self.output.resume() {
            Ok(()) => {
                self.initialized = true;
                debug!("audio output unlocked");
                true
            }
            Err(e) => {
                warn!(error = %e, "audio output could not be unlocked");
                false
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.5
        };
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Schedule one tone. Returns false when nothing was sent to the output.
    pub fn play_tone(
        &mut self,
        frequency_hz: f32,
        duration_ms: u32,
        waveform: Waveform,
        gain: f32,
        delay_ms: u32,
    ) -> bool {
        let tone = Tone {
            frequency_hz,
            duration_ms,
            waveform,
            gain,
            delay_ms,
        };
        self.play(&[tone])
    }

    pub fn play_start_beep(&mut self) -> bool {
        self.play(&[
            Tone::new(660.0, 120, Waveform::Sine),
            Tone::new(880.0, 180, Waveform::Sine).delay(130),
        ])
    }

    pub fn play_finish_beep(&mut self) -> bool {
        self.play(&[
            Tone::new(523.25, 200, Waveform::Triangle),
            Tone::new(659.25, 200, Waveform::Triangle).delay(220),
            Tone::new(783.99, 400, Waveform::Triangle).delay(440),
        ])
    }

    /// Short tick for the last seconds; the final second is higher and longer.
    pub fn play_countdown_beep(&mut self, seconds_left: u32) -> bool {
        let tone = if seconds_left <= 1 {
            Tone::new(1_000.0, 250, Waveform::Square).gain(0.2)
        } else {
            Tone::new(600.0, 100, Waveform::Square).gain(0.2)
        };
        self.play(&[tone])
    }

    pub fn play_interval_start_beep(&mut self) -> bool {
        self.play(&[
            Tone::new(880.0, 150, Waveform::Sine),
            Tone::new(880.0, 150, Waveform::Sine).delay(200),
        ])
    }

    pub fn play_interval_end_beep(&mut self) -> bool {
        self.play(&[Tone::new(440.0, 350, Waveform::Triangle)])
    }

    pub fn play_cue(&mut self, cue: Cue) -> bool {
        match cue {
            Cue::Start => self.play_start_beep(),
            Cue::Finish => self.play_finish_beep(),
            Cue::IntervalStart => self.play_interval_start_beep(),
            Cue::IntervalEnd => self.play_interval_end_beep(),
            Cue::Countdown(n) => self.play_countdown_beep(n),
        }
    }

    fn play(&mut self, tones: &[Tone]) -> bool {
        if !self.is_supported() || !self.initialized || !self.enabled || self.volume <= 0.0 {
            return false;
        }
        for tone in tones {
            self.output.play(tone, self.volume);
        }
        true
    }
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine")
            .field("supported", &self.is_supported())
            .field("initialized", &self.initialized)
            .field("enabled", &self.enabled)
            .field("volume", &self.volume)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualScheduler;

    #[test]
    fn locked_until_init() {
        let s = ManualScheduler::shared();
        let pcm = PcmOutput::new(s.clone());
        let mut engine = SoundEngine::new(Box::new(pcm.clone()));

        assert!(!engine.play_start_beep());
        assert!(pcm.played().is_empty());
        assert!(!engine.is_initialized());

        assert!(engine.init());
        assert!(engine.is_initialized());
        assert!(engine.init());
        assert!(engine.play_start_beep());
        assert_eq!(pcm.played().len(), 2);
    }

    #[test]
    fn unsupported_output_is_inert() {
        let mut engine = SoundEngine::new(Box::new(NullOutput::unsupported()));
        assert!(!engine.init());
        assert!(!engine.play_finish_beep());
        assert!(!engine.play_tone(440.0, 100, Waveform::Sine, 0.3, 0));
    }

    #[test]
    fn disabled_or_silent_engine_plays_nothing() {
        let s = ManualScheduler::shared();
        let pcm = PcmOutput::new(s.clone());
        let mut engine = SoundEngine::new(Box::new(pcm.clone()));
        engine.init();

        engine.set_enabled(false);
        assert!(!engine.play_cue(Cue::Start));
        engine.set_enabled(true);
        engine.set_volume(0.0);
        assert!(!engine.play_cue(Cue::Start));
        assert!(pcm.played().is_empty());
    }

    #[test]
    fn tones_land_at_scheduler_time_plus_delay() {
        let s = ManualScheduler::shared();
        let pcm = PcmOutput::with_sample_rate(s.clone(), 8_000);
        let mut engine = SoundEngine::new(Box::new(pcm.clone()));
        engine.init();

        s.advance(2_000);
        engine.play_tone(440.0, 100, Waveform::Sine, 0.3, 250);
        let played = pcm.played();
        assert_eq!(played[0].at_ms, 2_250);
        assert_eq!(pcm.duration_ms(), 2_350);
        assert!(pcm.samples()[..2_250 * 8].iter().all(|v| *v == 0.0));
    }

    struct RefusingOutput;

    impl AudioOutput for RefusingOutput {
        fn resume(&mut self) -> Result<(), AudioError> {
            Err(AudioError::ResumeFailed("device busy".into()))
        }

        fn play(&mut self, _tone: &Tone, _volume: f32) {
            panic!("played through a locked output");
        }
    }

    #[test]
    fn failed_resume_keeps_engine_locked() {
        let mut engine = SoundEngine::new(Box::new(RefusingOutput));
        assert!(engine.is_supported());
        assert!(!engine.init());
        assert!(!engine.is_initialized());
        assert!(!engine.play_cue(Cue::Finish));
        // A later gesture gets another attempt.
        assert!(!engine.init());
    }

    #[test]
    fn volume_is_clamped() {
        let mut engine = SoundEngine::new(Box::new(NullOutput::new()));
        engine.set_volume(3.0);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(f32::NAN);
        assert_eq!(engine.volume(), 0.5);
    }

    #[test]
    fn writes_wav() {
        let s = ManualScheduler::shared();
        let pcm = PcmOutput::with_sample_rate(s.clone(), 8_000);
        let mut engine = SoundEngine::new(Box::new(pcm.clone()));
        engine.init();
        engine.play_finish_beep();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cues.wav");
        pcm.write_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len() as usize, pcm.samples().len());
    }

    #[test]
    fn long_silence_is_not_buffered() {
        let s = ManualScheduler::shared();
        let pcm = PcmOutput::with_sample_rate(s.clone(), 8_000).with_max_gap(1_000);
        let mut engine = SoundEngine::new(Box::new(pcm.clone()));
        engine.init();

        engine.play_tone(440.0, 100, Waveform::Sine, 0.3, 0);
        s.advance(3_600_000);
        engine.play_tone(440.0, 100, Waveform::Sine, 0.3, 0);

        assert_eq!(pcm.played()[1].at_ms, 3_600_000);
        assert_eq!(pcm.duration_ms(), 1_200);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hour.wav");
        pcm.write_wav(&path).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 1_200 * 8);
    }

    #[test]
    fn leading_silence_is_capped() {
        let s = ManualScheduler::shared();
        let pcm = PcmOutput::with_sample_rate(s.clone(), 8_000).with_max_gap(500);
        let mut engine = SoundEngine::new(Box::new(pcm.clone()));
        engine.init();

        s.advance(90_000);
        engine.play_start_beep();
        // 500 ms of lead-in, then 130 ms + 180 ms for the two-tone chord.
        assert_eq!(pcm.duration_ms(), 810);
    }
}
