use repcycle_core::{Config, Stopwatch, TimerState};
use tracing::info;

use super::session::{CmdResult, Flow, Session};
use crate::OutputArgs;

pub fn run(limit_secs: Option<u32>, run_secs: Option<u32>, output: &OutputArgs) -> CmdResult {
    let config = Config::load_or_default();
    let mut session = Session::new(output, &config);
    let limit_ms = limit_secs.map(|s| i64::from(s) * 1000);
    let run_ms = run_secs.map(|s| i64::from(s) * 1000);
    let mut watch = Stopwatch::new(session.scheduler(), limit_ms);
    info!(?limit_secs, ?run_secs, "stopwatch");

    session.sync(|s| s.sync_stopwatch(watch.state(), watch.elapsed(), watch.time_limit()))?;
    session.emit(watch.start())?;
    session.sync(|s| s.sync_stopwatch(watch.state(), watch.elapsed(), watch.time_limit()))?;

    let flow = session.run(|session| {
        session.emit(watch.tick())?;
        session.sync(|s| s.sync_stopwatch(watch.state(), watch.elapsed(), watch.time_limit()))?;
        let out_of_time = run_ms.is_some_and(|ms| watch.elapsed() >= ms);
        Ok(if watch.state() == TimerState::Completed || out_of_time {
            Flow::Done
        } else {
            Flow::Continue
        })
    })?;

    if flow == Flow::Interrupted {
        info!(elapsed_ms = watch.elapsed(), "stopwatch interrupted");
    }
    let (_, stopped) = watch.stop();
    session.emit(stopped)?;
    session.finish()
}
