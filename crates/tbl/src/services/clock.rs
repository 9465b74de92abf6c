//! Clock process: time queries and cooperative sleeps.

use core::time::Duration;

use crate::context::StepContext;
use crate::handler::{HandlerData, HandlerKind};
use crate::process::{Process, StepTable};
use crate::step;
use crate::step::{StepOutput, StepResult};
use crate::time::{SharedTimeSource, SystemClock};
use crate::sync::Arc;

/// Monotonic time since the clock started.
#[derive(Debug, Default)]
pub struct GetClock {
    clock: Duration,
}

impl HandlerData for GetClock {
    const KIND: HandlerKind = HandlerKind::GetClock;
}

impl GetClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }
}

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Default)]
pub struct GetTime {
    time: Duration,
}

impl HandlerData for GetTime {
    const KIND: HandlerKind = HandlerKind::GetTime;
}

impl GetTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(&self) -> Duration {
        self.time
    }
}

/// Finishes once `duration` has elapsed on the Clock process's time source.
#[derive(Debug)]
pub struct SleepSec {
    duration: Duration,
    begin: Option<Duration>,
}

impl HandlerData for SleepSec {
    const KIND: HandlerKind = HandlerKind::SleepSec;
}

impl SleepSec {
    pub fn new(duration: Duration) -> Self {
        Self { duration, begin: None }
    }

    /// Negative and NaN inputs sleep for zero; values past the `Duration`
    /// range saturate.
    pub fn from_secs_f64(secs: f64) -> Self {
        let duration = if secs.is_nan() || secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        };
        Self::new(duration)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[derive(Debug)]
pub struct ClockProcess {
    time: SharedTimeSource,
}

impl ClockProcess {
    pub fn new(time: SharedTimeSource) -> Self {
        Self { time }
    }

    fn get_clock(&mut self, _ctx: &mut StepContext<'_>, req: &mut GetClock) -> StepOutput<Self, GetClock> {
        req.clock = self.time.monotonic();
        Ok(StepResult::Done)
    }

    fn get_time(&mut self, _ctx: &mut StepContext<'_>, req: &mut GetTime) -> StepOutput<Self, GetTime> {
        req.time = self.time.unix_time();
        Ok(StepResult::Done)
    }

    fn sleep_begin(&mut self, _ctx: &mut StepContext<'_>, req: &mut SleepSec) -> StepOutput<Self, SleepSec> {
        req.begin = Some(self.time.monotonic());
        Ok(StepResult::Continue(step!(Self::sleep_check_past)))
    }

    fn sleep_check_past(&mut self, _ctx: &mut StepContext<'_>, req: &mut SleepSec) -> StepOutput<Self, SleepSec> {
        let begin = *req.begin.get_or_insert_with(|| self.time.monotonic());
        if self.time.monotonic().saturating_sub(begin) < req.duration {
            return Ok(StepResult::Yield);
        }
        Ok(StepResult::Done)
    }
}

impl Default for ClockProcess {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }
}

impl Process for ClockProcess {
    const NAME: &'static str = "Clock";

    fn table(table: &mut StepTable<Self>) {
        table
            .defaults()
            .on(step!(Self::get_clock))
            .on(step!(Self::get_time))
            .on(step!(Self::sleep_begin));
    }
}
