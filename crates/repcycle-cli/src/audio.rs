//! Live cue outputs for the terminal.
//!
//! [`RodioOutput`] plays the rendered tones on the default sound device.
//! Hosts without a device fall back to [`BellOutput`].

use std::io::{self, Write};
use std::time::Duration;

use repcycle_core::cue::{render_tone, AudioOutput, Tone, SAMPLE_RATE};
use repcycle_core::AudioError;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, warn};

/// Plays tones on the default output device.
pub struct RodioOutput {
    // The stream must outlive every sink built from its handle.
    stream: Option<(OutputStream, OutputStreamHandle)>,
}

impl RodioOutput {
    /// Open the default device. A host without one yields an unsupported
    /// output rather than an error.
    pub fn open() -> Self {
        match OutputStream::try_default() {
            Ok(stream) => {
                debug!("audio device opened");
                Self {
                    stream: Some(stream),
                }
            }
            Err(e) => {
                debug!(error = %e, "no audio device");
                Self::unavailable()
            }
        }
    }

    pub fn unavailable() -> Self {
        Self { stream: None }
    }
}

impl AudioOutput for RodioOutput {
    fn is_supported(&self) -> bool {
        self.stream.is_some()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let Some((_, handle)) = &self.stream else {
            return Err(AudioError::Unsupported);
        };
        // A throwaway sink proves the device accepts playback.
        Sink::try_new(handle)
            .map(|_| ())
            .map_err(|e| AudioError::ResumeFailed(e.to_string()))
    }

    fn play(&mut self, tone: &Tone, volume: f32) {
        let Some((_, handle)) = &self.stream else {
            return;
        };
        let samples = render_tone(tone, volume, SAMPLE_RATE);
        let source = SamplesBuffer::new(1, SAMPLE_RATE, samples)
            .delay(Duration::from_millis(u64::from(tone.delay_ms)));
        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.append(source);
                sink.detach();
            }
            Err(e) => warn!(error = %e, "tone dropped"),
        }
    }
}

/// Rings the terminal bell once per cue.
pub struct BellOutput<W = io::Stderr> {
    out: W,
}

impl BellOutput {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> BellOutput<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn ring(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x07")?;
        self.out.flush()
    }
}

impl<W: Write> AudioOutput for BellOutput<W> {
    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&mut self, tone: &Tone, _volume: f32) {
        // Follow-up tones of a chord would only ring the bell again.
        if tone.delay_ms > 0 {
            return;
        }
        if let Err(e) = self.ring() {
            warn!(error = %e, "terminal bell failed");
        }
    }
}

/// The sound device when one accepts playback, else the terminal bell.
pub fn live_output(mut device: RodioOutput) -> Box<dyn AudioOutput> {
    match device.resume() {
        Ok(()) => Box::new(device),
        Err(e) => {
            warn!(error = %e, "no usable audio device, using the terminal bell");
            Box::new(BellOutput::stderr())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcycle_core::cue::Waveform;
    use repcycle_core::SoundEngine;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_device_is_unsupported() {
        let mut out = RodioOutput::unavailable();
        assert!(!out.is_supported());
        assert!(matches!(out.resume(), Err(AudioError::Unsupported)));
        out.play(&Tone::new(440.0, 100, Waveform::Sine), 0.5);

        let mut engine = SoundEngine::new(Box::new(RodioOutput::unavailable()));
        assert!(!engine.init());
    }

    #[test]
    fn missing_device_falls_back_to_bell() {
        let mut out = live_output(RodioOutput::unavailable());
        assert!(out.is_supported());
        assert!(out.resume().is_ok());
    }

    #[test]
    fn bell_rings_once_per_chord() {
        let mut bell = BellOutput::new(Vec::new());
        bell.play(&Tone::new(660.0, 120, Waveform::Sine), 0.5);
        bell.play(&Tone::new(880.0, 180, Waveform::Sine).delay(130), 0.5);
        assert_eq!(bell.out, b"\x07");
    }

    #[test]
    fn bell_survives_a_closed_stream() {
        let mut engine = SoundEngine::new(Box::new(BellOutput::new(BrokenPipe)));
        assert!(engine.init());
        assert!(engine.play_finish_beep());
    }
}
