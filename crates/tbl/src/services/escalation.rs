//! Error process: severity tracking and the escalation protocol.
//!
//! `SetError` records an error and, when it raises the severity, interrupts
//! every other process with an [`ErrorEvent`] and waits until all of them
//! have finished handling it. `ResetError` clears the records and severity,
//! sends every other process a normal [`Reset`] request and waits the same
//! way. Both waits are plain yields that poll the spawned handlers' status.

use core::fmt;
use core::str::FromStr;

use log::{info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::{SetupContext, StepContext};
use crate::error::{ParseLevelError, TblError};
use crate::handler::{HandlerData, HandlerKind, Hdl};
use crate::process::{Process, ProcessId, StepTable};
use crate::step::{StepOutput, StepResult};
use crate::step;
use crate::transport::Interceptor;

/// Error severity. Only ever raised, until a `ResetError`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorLevel {
    #[default]
    None = 0,
    Cycle = 1,
    Fatal = 2,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::Cycle => "CYCLE",
            Self::Fatal => "FATAL",
        })
    }
}

impl FromStr for ErrorLevel {
    type Err = ParseLevelError;

    /// Accepts the level name in any case or its numeric value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(Self::None),
            "cycle" | "1" => Ok(Self::Cycle),
            "fatal" | "2" => Ok(Self::Fatal),
            _ => Err(ParseLevelError::new("error", s)),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorId {
    #[default]
    None,
    /// A step returned `Failed`.
    RcError,
    Undefined,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub level: ErrorLevel,
    pub id: ErrorId,
    pub message: String,
}

/// Broadcast to every process when the severity rises.
#[derive(Debug)]
pub struct ErrorEvent {
    level: ErrorLevel,
}

impl HandlerData for ErrorEvent {
    const KIND: HandlerKind = HandlerKind::ErrorEvent;
}

impl ErrorEvent {
    pub fn new(level: ErrorLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> ErrorLevel {
        self.level
    }
}

/// Sent to every process by `ResetError`.
#[derive(Debug, Default)]
pub struct Reset;

impl HandlerData for Reset {
    const KIND: HandlerKind = HandlerKind::Reset;
}

/// Reports an error. Delivered through the Error process's interrupt queue.
#[derive(Debug)]
pub struct SetError {
    level: ErrorLevel,
    id: ErrorId,
    message: String,
    escalated: bool,
    events: Vec<Hdl<ErrorEvent>>,
}

impl HandlerData for SetError {
    const KIND: HandlerKind = HandlerKind::SetError;
}

impl SetError {
    pub fn new(level: ErrorLevel, id: ErrorId, message: impl Into<String>) -> Self {
        Self {
            level,
            id,
            message: message.into(),
            escalated: false,
            events: Vec::new(),
        }
    }

    pub fn level(&self) -> ErrorLevel {
        self.level
    }

    pub fn id(&self) -> ErrorId {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this report raised the severity.
    pub fn escalated(&self) -> bool {
        self.escalated
    }

    /// `ErrorEvent`s broadcast on behalf of this report.
    pub fn events(&self) -> &[Hdl<ErrorEvent>] {
        &self.events
    }
}

/// Clears all errors and resets every process.
#[derive(Debug, Default)]
pub struct ResetError {
    resets: Vec<Hdl<Reset>>,
}

impl HandlerData for ResetError {
    const KIND: HandlerKind = HandlerKind::ResetError;
}

impl ResetError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resets(&self) -> &[Hdl<Reset>] {
        &self.resets
    }
}

/// Snapshot of the current severity and records.
#[derive(Debug, Default)]
pub struct ErrorStatus {
    level: ErrorLevel,
    records: Vec<ErrorRecord>,
}

impl HandlerData for ErrorStatus {
    const KIND: HandlerKind = HandlerKind::ErrorStatus;
}

impl ErrorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> ErrorLevel {
        self.level
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }
}

/// Built-in process owning the error state.
#[derive(Debug, Default)]
pub struct ErrorProcess {
    level: ErrorLevel,
    records: Vec<ErrorRecord>,
    interceptors: Vec<Interceptor>,
}

impl ErrorProcess {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_error(&mut self, _ctx: &mut StepContext<'_>, req: &mut SetError) -> StepOutput<Self, SetError> {
        self.records.push(ErrorRecord {
            level: req.level,
            id: req.id,
            message: req.message.clone(),
        });
        if req.level <= self.level {
            info!("error recorded at {}: {}", req.level, req.message);
            return Ok(StepResult::Continue(step!(Self::wait_events)));
        }

        warn!("error level raised {} -> {}: {}", self.level, req.level, req.message);
        self.level = req.level;
        req.escalated = true;
        for interceptor in &self.interceptors {
            let event = Hdl::new(ErrorEvent::new(self.level));
            interceptor.interrupt(&event)?;
            req.events.push(event);
        }
        Ok(StepResult::Continue(step!(Self::wait_events)))
    }

    fn wait_events(&mut self, _ctx: &mut StepContext<'_>, req: &mut SetError) -> StepOutput<Self, SetError> {
        if req.events.iter().all(Hdl::is_terminal) {
            Ok(StepResult::Done)
        } else {
            Ok(StepResult::Yield)
        }
    }

    fn reset_error(&mut self, ctx: &mut StepContext<'_>, req: &mut ResetError) -> StepOutput<Self, ResetError> {
        info!("resetting errors ({} recorded, level {})", self.records.len(), self.level);
        self.records.clear();
        self.level = ErrorLevel::None;
        for interceptor in &self.interceptors {
            let reset = Hdl::new(Reset);
            ctx.request(interceptor.process(), &reset)?;
            req.resets.push(reset);
        }
        Ok(StepResult::Continue(step!(Self::wait_resets)))
    }

    fn wait_resets(&mut self, _ctx: &mut StepContext<'_>, req: &mut ResetError) -> StepOutput<Self, ResetError> {
        if req.resets.iter().all(Hdl::is_terminal) {
            Ok(StepResult::Done)
        } else {
            Ok(StepResult::Yield)
        }
    }

    fn error_status(&mut self, _ctx: &mut StepContext<'_>, req: &mut ErrorStatus) -> StepOutput<Self, ErrorStatus> {
        req.level = self.level;
        req.records = self.records.clone();
        Ok(StepResult::Done)
    }
}

impl Process for ErrorProcess {
    const NAME: &'static str = "Error";

    fn table(table: &mut StepTable<Self>) {
        table
            .defaults()
            .on(step!(Self::set_error))
            .on(step!(Self::reset_error))
            .on(step!(Self::error_status));
    }

    /// Captures the interrupt queue of every other registered process.
    fn setup(&mut self, ctx: &SetupContext<'_>) -> Result<(), TblError> {
        let own = ProcessId::of::<Self>();
        self.interceptors = ctx
            .registrations()
            .iter()
            .filter(|registration| registration.process != own)
            .map(|registration| {
                ctx.interceptor(registration.process)
                    .ok_or(TblError::UnknownProcess(registration.process))
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}
