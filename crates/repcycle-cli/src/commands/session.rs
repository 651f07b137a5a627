//! Shared frame loop for the timer commands.
//!
//! Every command owns its timer and hands a per-frame closure to
//! [`Session::run`]. The session owns the real-time scheduler, the cue
//! pipeline and stdout.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use chrono::Utc;
use repcycle_core::cue::{AudioOutput, NullOutput, PcmOutput};
use repcycle_core::timer::{SharedScheduler, SystemScheduler};
use repcycle_core::{Config, Cue, Event, Phase, SoundEngine, SoundManager, TimerState};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::audio::{live_output, RodioOutput};
use crate::OutputArgs;

pub type CmdResult<T = ()> = Result<T, Box<dyn Error>>;

const FRAME: Duration = Duration::from_millis(50);

/// Silence between cues in an exported WAV is cut down to this.
const MAX_WAV_GAP_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
    Interrupted,
}

pub struct Session {
    scheduler: Rc<SystemScheduler>,
    sounds: SoundManager,
    wav: Option<(PcmOutput, PathBuf)>,
}

impl Session {
    pub fn new(output: &OutputArgs, config: &Config) -> Self {
        let scheduler = SystemScheduler::shared();
        let mut wav = None;
        let audio: Box<dyn AudioOutput> = match &output.wav {
            Some(path) => {
                let pcm = PcmOutput::new(scheduler.clone()).with_max_gap(MAX_WAV_GAP_MS);
                wav = Some((pcm.clone(), path.clone()));
                Box::new(pcm)
            }
            None if output.quiet => Box::new(NullOutput::new()),
            None => live_output(RodioOutput::open()),
        };
        let engine = SoundEngine::shared(audio);
        let mut sounds = SoundManager::new(engine, scheduler.clone(), config.sound.clone());
        // Running a command is the gesture that unlocks audio.
        if !sounds.init() {
            warn!("audio unavailable, running without cues");
        }
        Self {
            scheduler,
            sounds,
            wav,
        }
    }

    pub fn scheduler(&self) -> SharedScheduler {
        self.scheduler.clone()
    }

    /// Print events to stdout, one JSON object per line.
    pub fn emit(&self, events: impl IntoIterator<Item = Event>) -> CmdResult {
        let mut out = std::io::stdout().lock();
        for event in events {
            writeln!(out, "{}", serde_json::to_string(&event)?)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Run one cue sync and report whatever played.
    pub fn sync(&mut self, f: impl FnOnce(&mut SoundManager) -> Vec<Cue>) -> CmdResult {
        let cues = f(&mut self.sounds);
        self.emit(cues.into_iter().map(|cue| Event::CuePlayed {
            cue,
            at: Utc::now(),
        }))
    }

    pub fn snapshot(&self, state: TimerState, phase: Option<Phase>, time_ms: i64) -> CmdResult {
        self.emit([Event::StateSnapshot {
            state,
            phase,
            time_ms,
            at: Utc::now(),
        }])
    }

    /// Call `frame` on every tick of the frame timer until it returns
    /// [`Flow::Done`] or the user hits Ctrl-C.
    pub fn run(&mut self, mut frame: impl FnMut(&mut Session) -> CmdResult<Flow>) -> CmdResult<Flow> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        rt.block_on(async {
            let mut interval = tokio::time::interval(FRAME);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            loop {
                tokio::select! {
                    res = &mut ctrl_c => {
                        res?;
                        info!("interrupted");
                        return Ok::<_, Box<dyn Error>>(Flow::Interrupted);
                    }
                    _ = interval.tick() => {
                        if frame(self)? == Flow::Done {
                            debug!("session finished");
                            return Ok(Flow::Done);
                        }
                    }
                }
            }
        })
    }

    /// Flush side outputs. Writes the WAV file when one was requested.
    pub fn finish(self) -> CmdResult {
        if let Some((pcm, path)) = self.wav {
            pcm.write_wav(&path)?;
            info!(
                path = %path.display(),
                cues = pcm.played().len(),
                duration_ms = pcm.duration_ms(),
                "cue track written"
            );
        }
        Ok(())
    }
}
