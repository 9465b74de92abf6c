//! Kernel error type.

use core::fmt;
use std::io;

use thiserror::Error;

use crate::handler::HandlerKind;
use crate::process::ProcessId;

/// Which of a thread's three queues an operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRole {
    Inbound,
    Outbound,
    Interrupt,
}

impl fmt::Display for QueueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Interrupt => "interrupt",
        })
    }
}

/// Configuration and runtime errors raised by the kernel.
///
/// None of these are recoverable: they indicate a wiring mistake or an
/// exhausted queue, and stop the worker that hits them.
#[derive(Error, Debug)]
pub enum TblError {
    #[error("thread count must be at least 1, got {0}")]
    InvalidThreadCount(usize),
    #[error("queue capacity must be at least 2, got {0}")]
    InvalidCapacity(usize),
    #[error("process {0} is already registered")]
    DuplicateProcess(ProcessId),
    #[error("process {process} assigned to thread {thread}, but only {threads} threads exist")]
    InvalidThread {
        process: ProcessId,
        thread: usize,
        threads: usize,
    },
    #[error("process {process} has no step for required handler kind {kind}")]
    MissingCapability { process: ProcessId, kind: HandlerKind },
    #[error("process {0} is not registered")]
    UnknownProcess(ProcessId),
    #[error("process {process} has no step for handler kind {kind}")]
    NoStep { process: ProcessId, kind: HandlerKind },
    #[error("step {step} of process {process} was resumed with the wrong process or handler type")]
    StepMismatch { process: ProcessId, step: &'static str },
    #[error("{queue} queue of thread {thread} is full")]
    QueueFull { queue: QueueRole, thread: usize },
    #[error("execution stack of capacity {0} overflowed")]
    StackOverflow(usize),
    #[error("orchestrator is already established")]
    AlreadyEstablished,
    #[error("orchestrator is not established")]
    NotEstablished,
    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),
    #[error("failed to spawn worker thread {thread}: {source}")]
    Spawn {
        thread: usize,
        #[source]
        source: io::Error,
    },
}

/// Error returned when parsing a level name fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {what} level `{input}`")]
pub struct ParseLevelError {
    pub(crate) what: &'static str,
    pub(crate) input: String,
}

impl ParseLevelError {
    pub(crate) fn new(what: &'static str, input: &str) -> Self {
        Self {
            what,
            input: input.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_names_the_queue_and_thread() {
        let err = TblError::QueueFull {
            queue: QueueRole::Interrupt,
            thread: 2,
        };
        assert_eq!(err.to_string(), "interrupt queue of thread 2 is full");
    }

    #[test]
    fn parse_error_message() {
        let err = ParseLevelError::new("log", "loud");
        assert_eq!(err.to_string(), "unknown log level `loud`");
    }
}
