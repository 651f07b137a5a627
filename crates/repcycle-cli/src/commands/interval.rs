use clap::Args;
use repcycle_core::{Config, StepSequencer, TimerState};
use tracing::info;

use super::session::{CmdResult, Flow, Session};
use crate::OutputArgs;

/// Every field falls back to the `[interval]` config section.
#[derive(Args, Debug, Clone)]
pub struct IntervalArgs {
    /// Seconds per work step
    #[arg(long)]
    pub work_secs: Option<u32>,
    /// Seconds per rest step
    #[arg(long)]
    pub rest_secs: Option<u32>,
    /// Number of work/rest pairs
    #[arg(long)]
    pub sets: Option<u32>,
    /// Times to run the whole plan (0 loops until Ctrl-C)
    #[arg(long)]
    pub repeat: Option<u32>,
    /// Leave out the rest after the final work step
    #[arg(long)]
    pub skip_last_rest: bool,
}

pub fn run(args: IntervalArgs, output: &OutputArgs) -> CmdResult {
    let mut config = Config::load_or_default();
    let iv = &mut config.interval;
    if let Some(v) = args.work_secs {
        iv.work_secs = v;
    }
    if let Some(v) = args.rest_secs {
        iv.rest_secs = v;
    }
    if let Some(v) = args.sets {
        iv.sets = v;
    }
    if let Some(v) = args.repeat {
        iv.repeat = v;
    }
    iv.skip_last_rest |= args.skip_last_rest;

    let plan = config.interval_plan();
    info!(?plan, "interval");
    let mut session = Session::new(output, &config);
    let mut seq = StepSequencer::new(session.scheduler(), plan.into_sequence());

    let sync = |session: &mut Session, seq: &StepSequencer| {
        let is_work = seq.current_step().map(|s| s.is_work()).unwrap_or(true);
        session.sync(|s| s.sync_interval(seq.state(), seq.remaining_ms(), seq.step_index(), is_work))
    };

    sync(&mut session, &seq)?;
    let started = seq.start();
    if started.is_empty() {
        info!("nothing to run");
        return session.finish();
    }
    session.emit(started)?;
    sync(&mut session, &seq)?;

    let flow = session.run(|session| {
        session.emit(seq.tick())?;
        sync(session, &seq)?;
        Ok(match seq.state() {
            TimerState::Completed => Flow::Done,
            _ => Flow::Continue,
        })
    })?;

    if flow == Flow::Interrupted {
        session.emit(seq.pause())?;
        session.snapshot(seq.state(), None, seq.remaining_ms())?;
    }
    session.finish()
}
