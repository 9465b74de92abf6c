//! Perpetual `Main` heartbeat shared by every process.
//!
//! Count up, ask the Clock process for a sleep of one cycle, yield until the
//! sleep finishes, then queue a fresh `Main` for the same process carrying
//! the counter over. The scheduler needs no special case for periodic work.

use core::time::Duration;

use crate::context::StepContext;
use crate::handler::{HandlerData, HandlerKind, Hdl};
use crate::process::Process;
use crate::services::clock::{ClockProcess, SleepSec};
use crate::step::{Step, StepOutput, StepResult};

/// Heartbeat handler queued for every process when the system is established.
#[derive(Debug)]
pub struct Main {
    cycle: Duration,
    counter: u64,
    sleep: Option<Hdl<SleepSec>>,
}

impl HandlerData for Main {
    const KIND: HandlerKind = HandlerKind::Main;
}

impl Main {
    pub fn new(cycle: Duration) -> Self {
        Self {
            cycle,
            counter: 0,
            sleep: None,
        }
    }

    pub fn cycle(&self) -> Duration {
        self.cycle
    }

    /// Beats completed so far, including the one in progress.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn next(&self) -> Self {
        Self {
            cycle: self.cycle,
            counter: self.counter,
            sleep: None,
        }
    }
}

/// Entry step of the stock heartbeat.
pub fn entry<P: Process>() -> Step<P, Main> {
    Step::new("count_up", count_up::<P>)
}

pub fn count_up<P: Process>(
    _process: &mut P,
    ctx: &mut StepContext<'_>,
    main: &mut Main,
) -> StepOutput<P, Main> {
    main.counter += 1;
    main.sleep = Some(ctx.request_to::<ClockProcess, _>(SleepSec::new(main.cycle))?);
    Ok(StepResult::Continue(Step::new("wait_interval", wait_interval::<P>)))
}

pub fn wait_interval<P: Process>(
    _process: &mut P,
    _ctx: &mut StepContext<'_>,
    main: &mut Main,
) -> StepOutput<P, Main> {
    match &main.sleep {
        Some(sleep) if !sleep.is_terminal() => Ok(StepResult::Yield),
        _ => Ok(StepResult::Continue(Step::new("recur", recur::<P>))),
    }
}

pub fn recur<P: Process>(
    _process: &mut P,
    ctx: &mut StepContext<'_>,
    main: &mut Main,
) -> StepOutput<P, Main> {
    ctx.request(ctx.process(), Hdl::new(main.next()))?;
    Ok(StepResult::Done)
}
