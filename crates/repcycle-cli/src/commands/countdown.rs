use repcycle_core::{Clock, Config, TimerState};
use tracing::info;

use super::session::{CmdResult, Flow, Session};
use crate::OutputArgs;

pub fn run(secs: Option<u32>, output: &OutputArgs) -> CmdResult {
    let config = Config::load_or_default();
    let secs = secs.unwrap_or(config.countdown.secs);
    let mut session = Session::new(output, &config);
    let mut clock = Clock::new(session.scheduler(), i64::from(secs) * 1000);
    info!(secs, "countdown");

    session.sync(|s| s.sync_countdown(clock.state(), clock.time()))?;
    session.emit(clock.start())?;
    session.sync(|s| s.sync_countdown(clock.state(), clock.time()))?;

    let flow = session.run(|session| {
        session.emit(clock.tick())?;
        session.sync(|s| s.sync_countdown(clock.state(), clock.time()))?;
        Ok(match clock.state() {
            TimerState::Completed => Flow::Done,
            _ => Flow::Continue,
        })
    })?;

    if flow == Flow::Interrupted {
        session.emit(clock.pause())?;
        session.snapshot(clock.state(), None, clock.time())?;
    }
    session.finish()
}
