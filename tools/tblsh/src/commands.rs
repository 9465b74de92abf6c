//! Command table for the interactive shell.
//!
//! Each entry pairs a regular expression with a parser that turns the
//! captures into a [`Command`]. Entries are tried in registration order and
//! the first pattern that matches the whole line wins.

use regex::{Captures, Regex};
use tbl::services::{ErrorLevel, LogLevel};

/// Parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the known commands.
    Help,
    /// Stop the system.
    Quit,
    /// Report an error to the Error process.
    Error { level: ErrorLevel, message: String },
    /// Clear the error level and broadcast Reset.
    Reset,
    /// Print the current error level and records.
    Status,
    /// Write one message line to the log file.
    Log { message: String },
    /// Change the log file threshold.
    LogLevel(LogLevel),
}

/// Result of matching one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// A pattern matched but its arguments did not parse.
    Invalid(String),
    Unknown,
}

type ParseFn = fn(&Captures<'_>) -> Result<Command, String>;

struct Entry {
    pattern: Regex,
    usage: &'static str,
    parse: ParseFn,
}

/// Ordered list of command patterns.
pub struct CommandTable {
    entries: Vec<Entry>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Table with every built-in command registered.
    pub fn builtin() -> Result<Self, regex::Error> {
        let mut table = Self::new();
        table
            .register(r"^help$", "help", |_| Ok(Command::Help))?
            .register(r"^(?:quit|exit)$", "quit", |_| Ok(Command::Quit))?
            .register(r"^error\s+(\S+)\s+(.+)$", "error <none|cycle|fatal> <message>", parse_error)?
            .register(r"^reset$", "reset", |_| Ok(Command::Reset))?
            .register(r"^status$", "status", |_| Ok(Command::Status))?
            .register(r"^log\s+(.+)$", "log <message>", |caps| {
                Ok(Command::Log {
                    message: caps[1].to_string(),
                })
            })?
            .register(r"^loglevel\s+(\S+)$", "loglevel <debug|message|warning|error>", |caps| {
                caps[1].parse().map(Command::LogLevel).map_err(|err| err.to_string())
            })?;
        Ok(table)
    }

    /// Appends a command pattern. Later entries only see lines no earlier
    /// entry matched.
    pub fn register(&mut self, pattern: &str, usage: &'static str, parse: ParseFn) -> Result<&mut Self, regex::Error> {
        self.entries.push(Entry {
            pattern: Regex::new(pattern)?,
            usage,
            parse,
        });
        Ok(self)
    }

    pub fn parse(&self, line: &str) -> Parsed {
        let line = line.trim();
        for entry in &self.entries {
            if let Some(caps) = entry.pattern.captures(line) {
                return match (entry.parse)(&caps) {
                    Ok(command) => Parsed::Command(command),
                    Err(reason) => Parsed::Invalid(reason),
                };
            }
        }
        Parsed::Unknown
    }

    pub fn usage(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.usage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.pattern.as_str()))
            .finish()
    }
}

fn parse_error(caps: &Captures<'_>) -> Result<Command, String> {
    let level = caps[1].parse::<ErrorLevel>().map_err(|err| err.to_string())?;
    Ok(Command::Error {
        level,
        message: caps[2].trim().to_string(),
    })
}
