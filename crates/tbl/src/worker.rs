//! Per-thread scheduler.
//!
//! A [`WorkerLoop`] owns the processes assigned to one thread and steps their
//! handlers. Each tick admits at most one new request from the inbound queue
//! and then drains all admitted work: interrupts preempt the active frame,
//! which is saved on the execution stack and restored, with its resumption
//! step intact, once the interrupt (and anything nested in it) finishes.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::collections::HashMap;

use log::{error, trace, warn};

use crate::context::StepContext;
use crate::error::{QueueRole, TblError};
use crate::handler::{Hdl, Status};
use crate::process::{ProcessId, ProcessSlot};
use crate::ring::RingBuffer;
use crate::services::escalation::{ErrorId, ErrorLevel, ErrorProcess, SetError};
use crate::step::{Frame, Outcome};
use crate::sync::Arc;
use crate::time::Cyclic;
use crate::transport::{Request, ThreadQueues, Transport};

/// LIFO of frames suspended by preemption.
///
/// Backed by a [`RingBuffer`] used from the head only: `push_front` saves a
/// frame and `dequeue` restores the most recent one.
#[derive(Debug)]
pub(crate) struct ExecutionStack {
    frames: RingBuffer<Frame>,
}

impl ExecutionStack {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: RingBuffer::with_capacity(capacity),
        }
    }

    fn push(&mut self, frame: Frame) -> Result<(), TblError> {
        let capacity = self.frames.capacity();
        self.frames
            .push_front(frame)
            .map_err(|_| TblError::StackOverflow(capacity))
    }

    fn pop(&mut self) -> Option<Frame> {
        self.frames.dequeue()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Scheduler of one worker thread.
pub struct WorkerLoop {
    thread: usize,
    stack: ExecutionStack,
    slots: Vec<Box<dyn ProcessSlot>>,
    index: HashMap<ProcessId, usize>,
    transport: Arc<Transport>,
}

impl WorkerLoop {
    pub(crate) fn new(
        thread: usize,
        transport: Arc<Transport>,
        slots: Vec<Box<dyn ProcessSlot>>,
        stack_capacity: usize,
    ) -> Self {
        let index = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.id(), position))
            .collect();
        Self {
            thread,
            stack: ExecutionStack::with_capacity(stack_capacity),
            slots,
            index,
            transport,
        }
    }

    pub fn thread(&self) -> usize {
        self.thread
    }

    fn queues(&self) -> &ThreadQueues {
        self.transport.thread_queues(self.thread)
    }

    /// Frames currently saved on the execution stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    /// Runs one tick: admit at most one inbound request, then execute until
    /// neither an active frame, a saved frame nor an interrupt remains.
    pub fn tick(&mut self) -> Result<(), TblError> {
        if let Some(request) = self.queues().inbound().dequeue() {
            let frame = self.admit(request)?;
            self.stack.push(frame)?;
        }

        let mut active: Option<Frame> = None;
        loop {
            if let Some(request) = self.queues().interrupts().dequeue() {
                let frame = self.admit(request)?;
                if let Some(preempted) = active.take() {
                    trace!("thread {}: {:?} preempted by {:?}", self.thread, preempted, frame);
                    self.stack.push(preempted)?;
                }
                active = Some(frame);
            }

            let mut frame = match active.take() {
                Some(frame) => frame,
                None => match self.stack.pop() {
                    Some(frame) => {
                        frame.handler.status_cell().store(Status::Running);
                        frame
                    }
                    None => break,
                },
            };

            match self.execute(&mut frame)? {
                Outcome::Continue => active = Some(frame),
                Outcome::Yield => self.resubmit(frame)?,
                Outcome::Done => frame.handler.status_cell().store(Status::Done),
                Outcome::Failed(code) => self.fail(frame, code)?,
            }
        }
        Ok(())
    }

    /// Drives [`tick`](Self::tick) every `period` until `running` is cleared
    /// or a tick fails. A failed tick clears `running` for every thread.
    pub fn run(mut self, period: Duration, running: Arc<AtomicBool>) -> Result<(), TblError> {
        let mut cyclic = Cyclic::new(period);
        while running.load(Ordering::Acquire) {
            if let Err(err) = self.tick() {
                error!("worker thread {} stopped: {err}", self.thread);
                running.store(false, Ordering::Release);
                return Err(err);
            }
            cyclic.wait();
        }
        Ok(())
    }

    /// Turns a request into a running frame positioned at its entry step, or
    /// at the carried resumption step for a yielded handler.
    fn admit(&self, request: Request) -> Result<Frame, TblError> {
        let (process, handler, resume) = request.into_parts();
        let slot = *self.index.get(&process).ok_or(TblError::UnknownProcess(process))?;
        let cursor = match resume {
            Some(cursor) => cursor,
            None => self.slots[slot].begin(handler.kind()).ok_or(TblError::NoStep {
                process,
                kind: handler.kind(),
            })?,
        };
        handler.status_cell().store(Status::Running);
        Ok(Frame {
            slot,
            process,
            handler,
            cursor,
        })
    }

    fn execute(&mut self, frame: &mut Frame) -> Result<Outcome, TblError> {
        let mut ctx = StepContext::new(frame.process, self.thread, &self.transport);
        let state = self.slots[frame.slot].state_mut();
        let outcome = frame.cursor.advance(state, &mut ctx, &frame.handler)?;
        trace!("thread {}: {:?} -> {:?}", self.thread, frame, outcome);
        Ok(outcome)
    }

    /// Sends a yielded handler to the back of the line on this thread's
    /// outbound queue, still positioned at the step that yielded.
    fn resubmit(&self, frame: Frame) -> Result<(), TblError> {
        let Frame {
            process,
            handler,
            cursor,
            ..
        } = frame;
        self.transport.enqueue(
            self.thread,
            QueueRole::Outbound,
            Request::resume(process, handler, cursor),
        )
    }

    fn fail(&self, frame: Frame, code: u32) -> Result<(), TblError> {
        frame.handler.status_cell().store(Status::Failed);
        let message = format!(
            "{}::{} returned RC_ERROR({code})",
            frame.process,
            frame.cursor.step_name()
        );
        warn!("thread {}: {message}", self.thread);

        let error = ProcessId::of::<ErrorProcess>();
        if self.transport.thread_of(error).is_none() {
            warn!("no Error process registered; failure report dropped");
            return Ok(());
        }
        let report = Hdl::new(SetError::new(ErrorLevel::Cycle, ErrorId::RcError, message));
        self.transport.interrupt(Request::new(error, report))?;
        Ok(())
    }
}

impl core::fmt::Debug for WorkerLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerLoop")
            .field("thread", &self.thread)
            .field("processes", &self.index.keys().collect::<Vec<_>>())
            .field("stack", &self.stack.depth())
            .finish()
    }
}
