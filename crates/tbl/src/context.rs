//! Runtime context handed to processes.
//!
//! [`StepContext`] is passed to every step and is how a process talks to the
//! rest of the system: requests go onto the thread's outbound queue and are
//! routed by the orchestrator, error reports go straight to the Error
//! process's interrupt queue. [`SetupContext`] is passed once to
//! [`Process::setup`](crate::process::Process::setup).

use crate::error::{QueueRole, TblError};
use crate::handler::{HandlerData, HandlerRef, Hdl};
use crate::process::{Process, ProcessId};
use crate::services::escalation::{ErrorId, ErrorLevel, ErrorProcess, SetError};
use crate::services::logfile::{LogLevel, LogProcess, WriteLog};
use crate::transport::{Interceptor, ProcessRegistration, Request, Transport};

/// Context of the step currently being executed.
#[derive(Debug)]
pub struct StepContext<'a> {
    process: ProcessId,
    thread: usize,
    transport: &'a Transport,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(process: ProcessId, thread: usize, transport: &'a Transport) -> Self {
        Self {
            process,
            thread,
            transport,
        }
    }

    /// Process the step belongs to.
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Worker thread executing the step.
    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn transport(&self) -> &'a Transport {
        self.transport
    }

    /// Queues `handler` for `target` behind everything already issued from
    /// this thread.
    pub fn request(&self, target: ProcessId, handler: impl Into<HandlerRef>) -> Result<(), TblError> {
        if self.transport.thread_of(target).is_none() {
            return Err(TblError::UnknownProcess(target));
        }
        self.transport
            .enqueue(self.thread, QueueRole::Outbound, Request::new(target, handler))
    }

    /// Creates a handler from `data`, requests it from `P` and returns the
    /// handle to poll.
    pub fn request_to<P: Process, T: HandlerData>(&self, data: T) -> Result<Hdl<T>, TblError> {
        let hdl = Hdl::new(data);
        self.request(ProcessId::of::<P>(), &hdl)?;
        Ok(hdl)
    }

    /// Reports an error to the Error process through its interrupt queue.
    pub fn set_error(
        &self,
        level: ErrorLevel,
        id: ErrorId,
        message: impl Into<String>,
    ) -> Result<Hdl<SetError>, TblError> {
        let hdl = Hdl::new(SetError::new(level, id, message));
        self.transport
            .interrupt(Request::new(ProcessId::of::<ErrorProcess>(), &hdl))?;
        Ok(hdl)
    }

    /// Writes one line through the Log process.
    pub fn write_log(&self, level: LogLevel, message: impl Into<String>) -> Result<Hdl<WriteLog>, TblError> {
        self.request_to::<LogProcess, _>(WriteLog::new(level, message))
    }
}

/// Context passed to a process's setup hook.
#[derive(Debug)]
pub struct SetupContext<'a> {
    process: ProcessId,
    thread: usize,
    transport: &'a Transport,
}

impl<'a> SetupContext<'a> {
    pub(crate) fn new(process: ProcessId, thread: usize, transport: &'a Transport) -> Self {
        Self {
            process,
            thread,
            transport,
        }
    }

    pub fn process(&self) -> ProcessId {
        self.process
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    pub fn registrations(&self) -> &'a [ProcessRegistration] {
        self.transport.registrations()
    }

    /// Interrupt queue handle of `process`.
    pub fn interceptor(&self, process: ProcessId) -> Option<Interceptor> {
        self.transport.interceptor(process)
    }
}
