//! Step protocol.
//!
//! A step is a plain function `fn(&mut P, &mut StepContext, &mut T)` over a
//! process `P` and handler data `T`. It runs one slice of the handler's state
//! machine and reports what the worker should do next through
//! [`StepResult`]. `Continue` carries the next [`Step`], so a handler's
//! resumption point is always a concrete function pointer.

use core::any::Any;
use core::fmt;

use crate::context::StepContext;
use crate::error::TblError;
use crate::handler::{HandlerCell, HandlerData, HandlerKind, HandlerRef};
use crate::process::ProcessId;

/// Return type of every step function.
///
/// `Err` is reserved for configuration errors (a full queue, an unknown
/// target); it stops the worker. Ordinary failures are `Ok(StepResult::Failed)`.
pub type StepOutput<P, T> = Result<StepResult<P, T>, TblError>;

pub type StepFn<P, T> = fn(&mut P, &mut StepContext<'_>, &mut T) -> StepOutput<P, T>;

/// Outcome of one step.
pub enum StepResult<P, T> {
    /// Run `next` immediately, in the same slice.
    Continue(Step<P, T>),
    /// Not ready: resubmit the handler at the back of the line, resuming at
    /// the same step.
    Yield,
    Done,
    /// Abort the handler and report `code` to the Error process.
    Failed(u32),
}

impl<P, T> fmt::Debug for StepResult<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue(next) => f.debug_tuple("Continue").field(&next.name()).finish(),
            Self::Yield => f.write_str("Yield"),
            Self::Done => f.write_str("Done"),
            Self::Failed(code) => f.debug_tuple("Failed").field(code).finish(),
        }
    }
}

/// Named step function pointer.
pub struct Step<P, T> {
    name: &'static str,
    run: StepFn<P, T>,
}

impl<P, T> Step<P, T> {
    pub fn new(name: &'static str, run: StepFn<P, T>) -> Self {
        Self { name, run }
    }

    /// Short name of the step (the last path segment it was declared with).
    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name).trim()
    }

    pub fn call(&self, process: &mut P, ctx: &mut StepContext<'_>, data: &mut T) -> StepOutput<P, T> {
        (self.run)(process, ctx, data)
    }
}

impl<P, T> Clone for Step<P, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, T> Copy for Step<P, T> {}

impl<P, T> fmt::Debug for Step<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Step").field(&self.name()).finish()
    }
}

/// Builds a [`Step`] from a function path, naming it after the path.
///
/// ```ignore
/// Ok(StepResult::Continue(step!(Self::sleep_check_past)))
/// ```
#[macro_export]
macro_rules! step {
    ($f:path) => {
        $crate::step::Step::new(stringify!($f), $f)
    };
}

/// Type-erased step outcome seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Continue,
    Yield,
    Done,
    Failed(u32),
}

/// Resumption point of a frame, erased over the process and handler types.
pub(crate) trait StepCursor: Send {
    fn step_name(&self) -> &'static str;

    fn advance(
        &mut self,
        process: &mut dyn Any,
        ctx: &mut StepContext<'_>,
        handler: &HandlerRef,
    ) -> Result<Outcome, TblError>;
}

pub(crate) struct TypedCursor<P, T> {
    step: Step<P, T>,
}

impl<P, T> TypedCursor<P, T> {
    pub(crate) fn new(step: Step<P, T>) -> Self {
        Self { step }
    }
}

impl<P: 'static, T: HandlerData> StepCursor for TypedCursor<P, T> {
    fn step_name(&self) -> &'static str {
        self.step.name()
    }

    fn advance(
        &mut self,
        process: &mut dyn Any,
        ctx: &mut StepContext<'_>,
        handler: &HandlerRef,
    ) -> Result<Outcome, TblError> {
        let (owner, name) = (ctx.process(), self.step.name());
        let mismatch = || TblError::StepMismatch {
            process: owner,
            step: name,
        };
        let process = process.downcast_mut::<P>().ok_or_else(mismatch)?;
        let cell = handler
            .as_any()
            .downcast_ref::<HandlerCell<T>>()
            .ok_or_else(mismatch)?;

        let mut data = cell.lock();
        let outcome = match self.step.call(process, ctx, &mut data)? {
            StepResult::Continue(next) => {
                self.step = next;
                Outcome::Continue
            }
            StepResult::Yield => Outcome::Yield,
            StepResult::Done => Outcome::Done,
            StepResult::Failed(code) => Outcome::Failed(code),
        };
        Ok(outcome)
    }
}

/// Frame of the execution stack: a handler, the process stepping it, and the
/// step it resumes at.
pub(crate) struct Frame {
    pub(crate) slot: usize,
    pub(crate) process: ProcessId,
    pub(crate) handler: HandlerRef,
    pub(crate) cursor: Box<dyn StepCursor>,
}

impl Frame {
    pub(crate) fn kind(&self) -> HandlerKind {
        self.handler.kind()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("process", &self.process)
            .field("kind", &self.kind())
            .field("step", &self.cursor.step_name())
            .finish()
    }
}
