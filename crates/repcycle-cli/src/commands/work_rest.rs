use clap::Args;
use repcycle_core::{Config, Phase, RestMode, TimerState, WorkRestEngine};
use tracing::info;

use super::session::{CmdResult, Flow, Session};
use crate::OutputArgs;

#[derive(Args, Debug, Clone)]
pub struct WorkRestArgs {
    /// Rest multiplier, e.g. 1.5 rests 90 s after 60 s of work
    #[arg(long)]
    pub ratio: Option<f64>,
    /// Rounds before the session ends
    #[arg(long)]
    pub rounds: Option<u32>,
    /// Seconds of work before each round is stopped
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub work_secs: u32,
    /// Rest a fixed number of seconds instead of by ratio
    #[arg(long)]
    pub fixed_rest_secs: Option<u32>,
}

pub fn run(args: WorkRestArgs, output: &OutputArgs) -> CmdResult {
    let config = Config::load_or_default();
    let mut session = Session::new(output, &config);
    let mut engine = WorkRestEngine::new(session.scheduler(), config.work_rest_options());
    if let Some(ratio) = args.ratio {
        engine.set_ratio(ratio);
    }
    if let Some(rounds) = args.rounds {
        engine.set_max_rounds(rounds);
    }
    if let Some(secs) = args.fixed_rest_secs {
        engine.set_rest_mode(RestMode::Fixed);
        engine.set_fixed_rest_secs(secs);
    }
    let work_ms = i64::from(args.work_secs) * 1000;
    info!(
        ratio = engine.ratio(),
        rounds = engine.max_rounds(),
        mode = ?engine.rest_mode(),
        work_secs = args.work_secs,
        "work/rest"
    );

    let sync = |session: &mut Session, engine: &WorkRestEngine| {
        let st = engine.state();
        session.sync(|s| s.sync_work_rest(st.state, st.phase, st.current_time_ms))
    };

    sync(&mut session, &engine)?;
    session.emit(engine.start_work())?;
    sync(&mut session, &engine)?;

    let flow = session.run(|session| {
        let mut events = engine.tick();
        let st = engine.state();
        let work_done = st.phase == Phase::Work
            && st.state == TimerState::Running
            && st.current_time_ms >= work_ms;
        if work_done {
            events.extend(engine.stop_work());
        }
        session.emit(events)?;
        sync(session, &engine)?;

        if engine.phase() == Phase::Idle {
            if engine.rounds() >= engine.max_rounds() {
                return Ok(Flow::Done);
            }
            session.emit(engine.start_work())?;
            sync(session, &engine)?;
        }
        Ok(Flow::Continue)
    })?;

    if flow == Flow::Interrupted {
        let st = engine.state();
        session.snapshot(st.state, Some(st.phase), st.current_time_ms)?;
    }
    session.finish()
}
