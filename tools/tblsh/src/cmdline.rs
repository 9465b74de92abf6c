//! The `Cmdline` process: reads shell lines and turns them into requests.
//!
//! Console input is read by a plain thread and handed over through a
//! channel; the process itself never blocks. Every heartbeat it checks the
//! pending `Keyin`, runs the command it produced and asks for the next line.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, warn};
use tbl::services::heartbeat::{self, Main};
use tbl::services::{ErrorId, ErrorProcess, ErrorStatus, LogLevel, LogProcess, ResetError, SetLogLevel};
use tbl::{
    step, HandlerData, HandlerKind, Hdl, Process, ShutdownHandle, Step, StepContext, StepOutput, StepResult,
    StepTable, TblError,
};

use crate::commands::{Command, CommandTable, Parsed};

pub const PROMPT: &str = ">>> ";

/// One line of console input.
#[derive(Debug, Default)]
pub struct Keyin {
    line: Option<String>,
}

impl HandlerData for Keyin {
    const KIND: HandlerKind = HandlerKind::User(1);
}

impl Keyin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The line read, or `None` once input is closed.
    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }
}

pub struct Cmdline {
    commands: CommandTable,
    lines: Receiver<String>,
    shutdown: ShutdownHandle,
    out: Box<dyn Write + Send>,
    keyin: Option<Hdl<Keyin>>,
    status: Option<Hdl<ErrorStatus>>,
    closed: bool,
}

impl Cmdline {
    pub fn new(commands: CommandTable, lines: Receiver<String>, shutdown: ShutdownHandle) -> Self {
        Self {
            commands,
            lines,
            shutdown,
            out: Box::new(io::stdout()),
            keyin: None,
            status: None,
            closed: false,
        }
    }

    /// Sends prompts and replies to `out` instead of stdout.
    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    fn main(&mut self, ctx: &mut StepContext<'_>, main: &mut Main) -> StepOutput<Self, Main> {
        self.report_status();
        self.check_keyin(ctx)?;
        heartbeat::count_up(self, ctx, main)
    }

    fn keyin(&mut self, _ctx: &mut StepContext<'_>, _keyin: &mut Keyin) -> StepOutput<Self, Keyin> {
        self.write(format_args!("{PROMPT}"));
        Ok(StepResult::Continue(Step::new("read_line", Self::read_line)))
    }

    fn read_line(&mut self, _ctx: &mut StepContext<'_>, keyin: &mut Keyin) -> StepOutput<Self, Keyin> {
        match self.lines.try_recv() {
            Ok(line) => {
                keyin.line = Some(line);
                Ok(StepResult::Done)
            }
            Err(TryRecvError::Empty) => Ok(StepResult::Yield),
            Err(TryRecvError::Disconnected) => Ok(StepResult::Done),
        }
    }

    fn check_keyin(&mut self, ctx: &mut StepContext<'_>) -> Result<(), TblError> {
        if self.closed {
            return Ok(());
        }
        match self.keyin.take() {
            Some(pending) if !pending.is_terminal() => self.keyin = Some(pending),
            Some(done) => {
                let line = done.lock().line.take();
                match line {
                    Some(line) => {
                        self.execute(ctx, &line)?;
                        self.keyin = Some(ctx.request_to::<Self, _>(Keyin::new())?);
                    }
                    None => {
                        info!("console input closed, stopping");
                        self.closed = true;
                        self.shutdown.stop();
                    }
                }
            }
            None => self.keyin = Some(ctx.request_to::<Self, _>(Keyin::new())?),
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &StepContext<'_>, line: &str) -> Result<(), TblError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        match self.commands.parse(line) {
            Parsed::Command(command) => {
                debug!("command {command:?}");
                self.run(ctx, command)?;
            }
            Parsed::Invalid(reason) => self.say(format_args!("{reason}")),
            Parsed::Unknown => self.say(format_args!("Unknown Command: {}", line.trim())),
        }
        Ok(())
    }

    fn run(&mut self, ctx: &StepContext<'_>, command: Command) -> Result<(), TblError> {
        match command {
            Command::Help => {
                let usage: Vec<_> = self.commands.usage().collect();
                for line in usage {
                    self.say(format_args!("  {line}"));
                }
            }
            Command::Quit => {
                info!("quit requested");
                self.shutdown.stop();
            }
            Command::Error { level, message } => {
                ctx.set_error(level, ErrorId::Undefined, message)?;
            }
            Command::Reset => {
                ctx.request_to::<ErrorProcess, _>(ResetError::new())?;
            }
            Command::Status => {
                self.status = Some(ctx.request_to::<ErrorProcess, _>(ErrorStatus::new())?);
            }
            Command::Log { message } => {
                ctx.write_log(LogLevel::Message, message)?;
            }
            Command::LogLevel(level) => {
                ctx.request_to::<LogProcess, _>(SetLogLevel::new(level))?;
            }
        }
        Ok(())
    }

    fn report_status(&mut self) {
        if !self.status.as_ref().is_some_and(Hdl::is_terminal) {
            return;
        }
        let Some(status) = self.status.take() else {
            return;
        };
        let status = status.lock();
        self.say(format_args!("level: {}", status.level()));
        for record in status.records() {
            self.say(format_args!("  [{}] {:?}: {}", record.level, record.id, record.message));
        }
    }

    fn say(&mut self, args: fmt::Arguments<'_>) {
        self.write(format_args!("{args}\n"));
    }

    fn write(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = self.out.write_fmt(args).and_then(|()| self.out.flush()) {
            warn!("console write failed: {err}");
        }
    }
}

impl fmt::Debug for Cmdline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cmdline")
            .field("commands", &self.commands)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Process for Cmdline {
    const NAME: &'static str = "Cmdline";

    fn table(table: &mut StepTable<Self>) {
        table
            .defaults()
            .on(Step::new("main", Self::main))
            .on(step!(Self::keyin));
    }
}

/// Spawns a thread forwarding stdin lines into a channel. The channel
/// disconnects when stdin reaches end of file.
pub fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new().name("tblsh-stdin".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin reader finished");
    })?;
    Ok(rx)
}
