//! Requests, per-thread queues and the routing table.
//!
//! The [`Transport`] is filled in while processes are registered and frozen
//! once the orchestrator is established; from then on it is shared read-only
//! by every worker, so routing lookups need no synchronization beyond the
//! queues' own locks.

use core::fmt;
use core::time::Duration;
use std::collections::HashMap;

use log::debug;

use crate::error::{QueueRole, TblError};
use crate::handler::HandlerRef;
use crate::process::ProcessId;
use crate::ring::ConcurrentRingBuffer;
use crate::step::StepCursor;
use crate::sync::Arc;

/// A handler addressed to a process.
pub struct Request {
    target: ProcessId,
    handler: HandlerRef,
    resume: Option<Box<dyn StepCursor>>,
}

impl Request {
    pub fn new(target: ProcessId, handler: impl Into<HandlerRef>) -> Self {
        Self {
            target,
            handler: handler.into(),
            resume: None,
        }
    }

    /// Request that re-admits a yielded handler at `cursor` instead of the
    /// entry step.
    pub(crate) fn resume(target: ProcessId, handler: HandlerRef, cursor: Box<dyn StepCursor>) -> Self {
        Self {
            target,
            handler,
            resume: Some(cursor),
        }
    }

    pub fn target(&self) -> ProcessId {
        self.target
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub(crate) fn into_parts(self) -> (ProcessId, HandlerRef, Option<Box<dyn StepCursor>>) {
        (self.target, self.handler, self.resume)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("target", &self.target)
            .field("handler", &self.handler)
            .field("resume", &self.resume.as_ref().map(|cursor| cursor.step_name()))
            .finish()
    }
}

pub type RequestQueue = ConcurrentRingBuffer<Request>;

/// The three queues owned by one worker thread.
#[derive(Debug, Clone)]
pub struct ThreadQueues {
    inbound: Arc<RequestQueue>,
    outbound: Arc<RequestQueue>,
    interrupts: Arc<RequestQueue>,
}

impl ThreadQueues {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            inbound: Arc::new(RequestQueue::with_capacity(capacity)),
            outbound: Arc::new(RequestQueue::with_capacity(capacity)),
            interrupts: Arc::new(RequestQueue::with_capacity(capacity)),
        }
    }

    /// Requests routed to processes on this thread.
    pub fn inbound(&self) -> &RequestQueue {
        &self.inbound
    }

    /// Requests issued by processes on this thread, waiting to be routed.
    pub fn outbound(&self) -> &RequestQueue {
        &self.outbound
    }

    pub fn interrupts(&self) -> &RequestQueue {
        &self.interrupts
    }

    pub(crate) fn get(&self, role: QueueRole) -> &RequestQueue {
        match role {
            QueueRole::Inbound => &self.inbound,
            QueueRole::Outbound => &self.outbound,
            QueueRole::Interrupt => &self.interrupts,
        }
    }
}

/// Placement of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRegistration {
    pub process: ProcessId,
    pub thread: usize,
    pub cycle: Duration,
}

/// Handle to the interrupt queue of the thread hosting `process`.
#[derive(Debug, Clone)]
pub struct Interceptor {
    process: ProcessId,
    thread: usize,
    queue: Arc<RequestQueue>,
}

impl Interceptor {
    pub fn process(&self) -> ProcessId {
        self.process
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    /// Delivers `handler` to the process as an interrupt.
    pub fn interrupt(&self, handler: impl Into<HandlerRef>) -> Result<(), TblError> {
        self.queue
            .enqueue(Request::new(self.process, handler))
            .map_err(|_| TblError::QueueFull {
                queue: QueueRole::Interrupt,
                thread: self.thread,
            })
    }
}

/// Registration table plus every thread's queues.
#[derive(Debug)]
pub struct Transport {
    registrations: Vec<ProcessRegistration>,
    routes: HashMap<ProcessId, usize>,
    queues: Vec<ThreadQueues>,
}

impl Transport {
    pub(crate) fn new(threads: usize, capacity: usize) -> Self {
        Self {
            registrations: Vec::new(),
            routes: HashMap::new(),
            queues: (0..threads).map(|_| ThreadQueues::with_capacity(capacity)).collect(),
        }
    }

    pub(crate) fn register(&mut self, registration: ProcessRegistration) -> Result<(), TblError> {
        let ProcessRegistration { process, thread, .. } = registration;
        if self.routes.contains_key(&process) {
            return Err(TblError::DuplicateProcess(process));
        }
        if thread >= self.queues.len() {
            return Err(TblError::InvalidThread {
                process,
                thread,
                threads: self.queues.len(),
            });
        }
        debug!("registered {process} on thread {thread} every {:?}", registration.cycle);
        self.routes.insert(process, thread);
        self.registrations.push(registration);
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.queues.len()
    }

    /// Registrations in the order they were made.
    pub fn registrations(&self) -> &[ProcessRegistration] {
        &self.registrations
    }

    pub fn thread_of(&self, process: ProcessId) -> Option<usize> {
        self.routes.get(&process).copied()
    }

    pub fn queues(&self, thread: usize) -> Option<&ThreadQueues> {
        self.queues.get(thread)
    }

    pub(crate) fn thread_queues(&self, thread: usize) -> &ThreadQueues {
        &self.queues[thread]
    }

    pub fn interceptor(&self, process: ProcessId) -> Option<Interceptor> {
        let thread = self.thread_of(process)?;
        Some(Interceptor {
            process,
            thread,
            queue: Arc::clone(&self.queues[thread].interrupts),
        })
    }

    fn owner(&self, process: ProcessId) -> Result<usize, TblError> {
        self.thread_of(process).ok_or(TblError::UnknownProcess(process))
    }

    pub(crate) fn enqueue(&self, thread: usize, role: QueueRole, request: Request) -> Result<(), TblError> {
        self.queues[thread]
            .get(role)
            .enqueue(request)
            .map_err(|_| TblError::QueueFull { queue: role, thread })
    }

    /// Places `request` on the inbound queue of the thread owning its target.
    pub(crate) fn deliver(&self, request: Request) -> Result<usize, TblError> {
        let thread = self.owner(request.target())?;
        self.enqueue(thread, QueueRole::Inbound, request)?;
        Ok(thread)
    }

    /// Places `request` on the interrupt queue of the thread owning its target.
    pub(crate) fn interrupt(&self, request: Request) -> Result<usize, TblError> {
        let thread = self.owner(request.target())?;
        self.enqueue(thread, QueueRole::Interrupt, request)?;
        Ok(thread)
    }

    /// Drains every outbound queue once, delivering each request to its
    /// target's inbound queue. Returns the number of requests moved.
    ///
    /// Only requests present when a queue is first inspected are moved, so a
    /// routing pass is bounded even while workers keep issuing requests.
    pub(crate) fn route(&self) -> Result<usize, TblError> {
        let mut moved = 0;
        for queues in &self.queues {
            let pending = queues.outbound.len();
            for _ in 0..pending {
                let Some(request) = queues.outbound.dequeue() else {
                    break;
                };
                self.deliver(request)?;
                moved += 1;
            }
        }
        Ok(moved)
    }
}
