//! Log process: application log lines persisted through FileIO.
//!
//! Lines go to `<dir>/<startup-unix-seconds>.log` as
//! `<unix-seconds> [<LEVEL>] <message>`. Writes below the minimum level
//! finish immediately without touching the file.

use core::fmt;
use core::str::FromStr;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::context::StepContext;
use crate::error::ParseLevelError;
use crate::handler::{HandlerData, HandlerKind, Hdl};
use crate::process::{Process, StepTable};
use crate::services::fileio::{Close, FileIoProcess, Open, OpenMode};
use crate::step;
use crate::step::{StepOutput, StepResult};
use crate::time::SharedTimeSource;

/// `Failed` code when the log file cannot be opened.
pub const RC_OPEN_FAILED: u32 = 1;
/// `Failed` code when writing the line fails.
pub const RC_WRITE_FAILED: u32 = 2;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    #[default]
    Message,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Message => "MESSAGE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "message" | "msg" | "info" => Ok(Self::Message),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError::new("log", s)),
        }
    }
}

#[derive(Debug)]
pub struct WriteLog {
    level: LogLevel,
    message: String,
    open: Option<Hdl<Open>>,
    close: Option<Hdl<Close>>,
    written: bool,
}

impl HandlerData for WriteLog {
    const KIND: HandlerKind = HandlerKind::WriteLog;
}

impl WriteLog {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            open: None,
            close: None,
            written: false,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the line reached the file (false when filtered out).
    pub fn written(&self) -> bool {
        self.written
    }
}

/// Changes the minimum level written.
#[derive(Debug)]
pub struct SetLogLevel {
    level: LogLevel,
}

impl HandlerData for SetLogLevel {
    const KIND: HandlerKind = HandlerKind::LogLevel;
}

impl SetLogLevel {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }
}

#[derive(Debug)]
pub struct LogProcess {
    level: LogLevel,
    path: PathBuf,
    time: SharedTimeSource,
}

impl LogProcess {
    /// Log file named after the current Unix time of `time`, inside `dir`.
    pub fn new(dir: impl AsRef<Path>, level: LogLevel, time: SharedTimeSource) -> Self {
        let path = dir
            .as_ref()
            .join(format!("{}.log", time.unix_time().as_secs()));
        Self { level, path, time }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    fn check_level(&mut self, _ctx: &mut StepContext<'_>, req: &mut WriteLog) -> StepOutput<Self, WriteLog> {
        if req.level < self.level {
            return Ok(StepResult::Done);
        }
        Ok(StepResult::Continue(step!(Self::open_file)))
    }

    fn open_file(&mut self, ctx: &mut StepContext<'_>, req: &mut WriteLog) -> StepOutput<Self, WriteLog> {
        req.open = Some(ctx.request_to::<FileIoProcess, _>(Open::new(&self.path, OpenMode::Append))?);
        Ok(StepResult::Continue(step!(Self::wait_open_file)))
    }

    fn wait_open_file(&mut self, _ctx: &mut StepContext<'_>, req: &mut WriteLog) -> StepOutput<Self, WriteLog> {
        match &req.open {
            Some(open) if !open.is_terminal() => Ok(StepResult::Yield),
            _ => Ok(StepResult::Continue(step!(Self::write))),
        }
    }

    fn write(&mut self, _ctx: &mut StepContext<'_>, req: &mut WriteLog) -> StepOutput<Self, WriteLog> {
        let file = req
            .open
            .as_ref()
            .and_then(|open| open.lock().file().cloned());
        let Some(file) = file else {
            return Ok(StepResult::Failed(RC_OPEN_FAILED));
        };

        let line = format!(
            "{} [{}] {}\n",
            self.time.unix_time().as_secs(),
            req.level,
            req.message
        );
        if file.lock().write_all(line.as_bytes()).is_err() {
            return Ok(StepResult::Failed(RC_WRITE_FAILED));
        }
        req.written = true;
        Ok(StepResult::Continue(step!(Self::close_file)))
    }

    fn close_file(&mut self, ctx: &mut StepContext<'_>, req: &mut WriteLog) -> StepOutput<Self, WriteLog> {
        req.close = Some(ctx.request_to::<FileIoProcess, _>(Close::new(&self.path))?);
        Ok(StepResult::Continue(step!(Self::wait_close_file)))
    }

    fn wait_close_file(&mut self, _ctx: &mut StepContext<'_>, req: &mut WriteLog) -> StepOutput<Self, WriteLog> {
        match &req.close {
            Some(close) if !close.is_terminal() => Ok(StepResult::Yield),
            _ => Ok(StepResult::Done),
        }
    }

    fn set_level(&mut self, _ctx: &mut StepContext<'_>, req: &mut SetLogLevel) -> StepOutput<Self, SetLogLevel> {
        self.level = req.level;
        Ok(StepResult::Done)
    }
}

impl Process for LogProcess {
    const NAME: &'static str = "Log";

    fn table(table: &mut StepTable<Self>) {
        table
            .defaults()
            .on(step!(Self::check_level))
            .on(step!(Self::set_level));
    }
}
