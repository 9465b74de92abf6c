//! Top-level wiring: process placement, startup, routing and shutdown.
//!
//! The orchestrator owns one [`WorkerLoop`] per thread. Thread 0 is driven
//! synchronously by [`Orchestrator::step`] (or [`Orchestrator::run`]) from the
//! embedding application; every other thread gets its own OS thread with a
//! drift-corrected tick. Each `step` first routes every thread's outbound
//! queue, which is what lets a process address any other process by identity
//! without knowing where it runs.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::mem;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::context::SetupContext;
use crate::error::{QueueRole, TblError};
use crate::handler::{HandlerData, HandlerRef, Hdl};
use crate::process::{boxed, Process, ProcessId, ProcessSlot};
use crate::ring::QUEUE_CAPACITY;
use crate::services::clock::ClockProcess;
use crate::services::escalation::{ErrorId, ErrorLevel, ErrorProcess, SetError};
use crate::services::fileio::FileIoProcess;
use crate::services::heartbeat::Main;
use crate::services::logfile::{LogLevel, LogProcess};
use crate::sync::Arc;
use crate::time::{Cyclic, SharedTimeSource, SystemClock};
use crate::transport::{ProcessRegistration, Request, ThreadQueues, Transport};
use crate::worker::WorkerLoop;

/// Orchestrator sizing and built-in process settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub threads: usize,
    /// Tick period of every worker loop.
    pub tick: Duration,
    pub queue_capacity: usize,
    pub log_dir: PathBuf,
    pub log_level: LogLevel,
    pub error_cycle: Duration,
    pub clock_cycle: Duration,
    pub fileio_cycle: Duration,
    pub log_cycle: Duration,
    pub time: SharedTimeSource,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            tick: Duration::from_millis(1),
            queue_capacity: QUEUE_CAPACITY,
            log_dir: PathBuf::from("log"),
            log_level: LogLevel::Message,
            error_cycle: Duration::from_millis(1),
            clock_cycle: Duration::from_millis(1),
            fileio_cycle: Duration::from_millis(100),
            log_cycle: Duration::from_millis(100),
            time: Arc::new(SystemClock::new()),
        }
    }
}

impl OrchestratorConfig {
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    fn validate(&self) -> Result<(), TblError> {
        if self.threads == 0 {
            return Err(TblError::InvalidThreadCount(self.threads));
        }
        if self.queue_capacity < 2 {
            return Err(TblError::InvalidCapacity(self.queue_capacity));
        }
        Ok(())
    }
}

/// Builder for [`OrchestratorConfig`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// Sets the number of worker threads, thread 0 included.
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    pub fn tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// Sets the capacity of every queue and execution stack.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Sets the heartbeat cycles of the Error, Clock, FileIO and Log processes.
    pub fn builtin_cycles(mut self, error: Duration, clock: Duration, fileio: Duration, log: Duration) -> Self {
        self.config.error_cycle = error;
        self.config.clock_cycle = clock;
        self.config.fileio_cycle = fileio;
        self.config.log_cycle = log;
        self
    }

    pub fn time_source(mut self, time: SharedTimeSource) -> Self {
        self.config.time = time;
        self
    }

    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}

/// Clears the shared running flag, stopping every worker at its next tick.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    transport: Arc<Transport>,
    pending: Vec<Vec<Box<dyn ProcessSlot>>>,
    primary: Option<WorkerLoop>,
    workers: Vec<(usize, JoinHandle<Result<(), TblError>>)>,
    running: Arc<AtomicBool>,
    established: bool,
}

impl Orchestrator {
    /// Creates the queues of every thread and registers the built-in
    /// processes on thread 0.
    pub fn new(config: OrchestratorConfig) -> Result<Self, TblError> {
        config.validate()?;
        let mut orchestrator = Self {
            transport: Arc::new(Transport::new(config.threads, config.queue_capacity)),
            pending: (0..config.threads).map(|_| Vec::new()).collect(),
            primary: None,
            workers: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            established: false,
            config,
        };

        let time = Arc::clone(&orchestrator.config.time);
        let log = LogProcess::new(&orchestrator.config.log_dir, orchestrator.config.log_level, Arc::clone(&time));
        let cycles = (
            orchestrator.config.error_cycle,
            orchestrator.config.clock_cycle,
            orchestrator.config.fileio_cycle,
            orchestrator.config.log_cycle,
        );
        orchestrator.register(ErrorProcess::new(), 0, cycles.0)?;
        orchestrator.register(ClockProcess::new(time), 0, cycles.1)?;
        orchestrator.register(FileIoProcess::new(), 0, cycles.2)?;
        orchestrator.register(log, 0, cycles.3)?;
        Ok(orchestrator)
    }

    pub fn with_defaults() -> Result<Self, TblError> {
        Self::new(OrchestratorConfig::default())
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Assigns `process` to `thread` with a heartbeat every `cycle`.
    pub fn register<P: Process>(&mut self, process: P, thread: usize, cycle: Duration) -> Result<(), TblError> {
        if self.established {
            return Err(TblError::AlreadyEstablished);
        }
        let slot = boxed(process)?;
        Arc::get_mut(&mut self.transport)
            .ok_or(TblError::AlreadyEstablished)?
            .register(ProcessRegistration {
                process: ProcessId::of::<P>(),
                thread,
                cycle,
            })?;
        self.pending[thread].push(slot);
        Ok(())
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Runs every setup hook, queues one `Main` per process in registration
    /// order, and starts the worker threads other than thread 0.
    pub fn establish(&mut self) -> Result<(), TblError> {
        if self.established {
            return Err(TblError::AlreadyEstablished);
        }
        self.established = true;

        for (thread, slots) in self.pending.iter_mut().enumerate() {
            for slot in slots.iter_mut() {
                let id = slot.id();
                slot.setup(&SetupContext::new(id, thread, &self.transport))?;
            }
        }
        for registration in self.transport.registrations() {
            let main = Hdl::new(Main::new(registration.cycle));
            self.transport.deliver(Request::new(registration.process, main))?;
        }

        self.running.store(true, Ordering::Release);
        let capacity = self.config.queue_capacity;
        for (thread, slots) in mem::take(&mut self.pending).into_iter().enumerate() {
            let worker = WorkerLoop::new(thread, Arc::clone(&self.transport), slots, capacity);
            if thread == 0 {
                self.primary = Some(worker);
                continue;
            }
            let (tick, running) = (self.config.tick, Arc::clone(&self.running));
            let handle = thread::Builder::new()
                .name(format!("tbl-worker-{thread}"))
                .spawn(move || worker.run(tick, running))
                .map_err(|source| TblError::Spawn { thread, source })?;
            debug!("spawned worker thread {thread}");
            self.workers.push((thread, handle));
        }

        info!(
            "established {} processes on {} threads",
            self.transport.registrations().len(),
            self.config.threads
        );
        Ok(())
    }

    /// One routing pass followed by one tick of thread 0.
    pub fn step(&mut self) -> Result<(), TblError> {
        self.route()?;
        self.primary.as_mut().ok_or(TblError::NotEstablished)?.tick()
    }

    /// Moves every pending outbound request to its target's inbound queue.
    pub fn route(&self) -> Result<usize, TblError> {
        self.transport.route()
    }

    /// Drives thread 0 every tick until [`ShutdownHandle::stop`] is called,
    /// then joins the other workers.
    pub fn run(&mut self) -> Result<(), TblError> {
        if !self.established {
            return Err(TblError::NotEstablished);
        }
        let mut cyclic = Cyclic::new(self.config.tick);
        while self.running.load(Ordering::Acquire) {
            if let Err(err) = self.step() {
                error!("worker thread 0 stopped: {err}");
                self.running.store(false, Ordering::Release);
                self.join_workers()?;
                return Err(err);
            }
            cyclic.wait();
        }
        self.join_workers()
    }

    /// Issues a normal request from the embedding application, as if from a
    /// process on thread 0.
    pub fn request(&self, target: ProcessId, handler: impl Into<HandlerRef>) -> Result<(), TblError> {
        if self.transport.thread_of(target).is_none() {
            return Err(TblError::UnknownProcess(target));
        }
        self.transport
            .enqueue(0, QueueRole::Outbound, Request::new(target, handler))
    }

    pub fn request_to<P: Process, T: HandlerData>(&self, data: T) -> Result<Hdl<T>, TblError> {
        let hdl = Hdl::new(data);
        self.request(ProcessId::of::<P>(), &hdl)?;
        Ok(hdl)
    }

    /// Reports an error through the Error process's interrupt queue.
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

    pub fn queues(&self, thread: usize) -> Option<&ThreadQueues> {
        self.transport.queues(thread)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.running))
    }

    /// Stops and joins every worker thread. Returns the first worker error.
    pub fn shutdown(&mut self) -> Result<(), TblError> {
        self.running.store(false, Ordering::Release);
        let joined = self.join_workers();
        info!("orchestrator shut down");
        joined
    }

    fn join_workers(&mut self) -> Result<(), TblError> {
        let mut first = None;
        for (thread, handle) in self.workers.drain(..) {
            let outcome = match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(TblError::WorkerPanicked(thread)),
            };
            if let Err(err) = outcome {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Err(err) = self.join_workers() {
            error!("worker failed during shutdown: {err}");
        }
    }
}

impl core::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("threads", &self.config.threads)
            .field("processes", &self.transport.registrations().len())
            .field("established", &self.established)
            .finish()
    }
}
