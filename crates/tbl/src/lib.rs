//! # tbl
//!
//! A table-driven cooperative multitasking kernel. A fixed pool of worker
//! loops runs any number of long-lived handlers as incrementally stepped
//! state machines. Nothing ever blocks a worker: waiting is a `Yield` that
//! sends the handler to the back of the line, and urgent work arrives on a
//! separate interrupt queue that preempts whatever is running.
//!
//! ## Module Overview
//! - [`ring`]         – Fixed-capacity ring buffers, plain and split-locked.
//! - [`handler`]      – Handler cells, kinds and the shared status field.
//! - [`step`]         – The step protocol (`Continue`/`Yield`/`Done`/`Failed`).
//! - [`process`]      – Processes and their handler-kind step tables.
//! - [`transport`]    – Requests, per-thread queues and routing.
//! - [`worker`]       – The per-thread tick algorithm.
//! - [`orchestrator`] – Registration, startup, routing and shutdown.
//! - [`services`]     – Built-in Error, Clock, FileIO and Log processes.
//!
//! ```no_run
//! use core::time::Duration;
//! use tbl::{Orchestrator, OrchestratorConfig, Process, StepTable};
//!
//! struct Blinky;
//!
//! impl Process for Blinky {
//!     const NAME: &'static str = "Blinky";
//!
//!     fn table(table: &mut StepTable<Self>) {
//!         table.defaults();
//!     }
//! }
//!
//! let mut orchestrator = Orchestrator::new(OrchestratorConfig::builder().threads(2).build())?;
//! orchestrator.register(Blinky, 1, Duration::from_millis(500))?;
//! orchestrator.establish()?;
//! orchestrator.run()?;
//! # Ok::<(), tbl::TblError>(())
//! ```

pub mod context;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod process;
pub mod ring;
pub mod services;
pub mod step;
pub mod sync;
pub mod time;
pub mod transport;
pub mod worker;

pub use context::{SetupContext, StepContext};
pub use error::{ParseLevelError, QueueRole, TblError};
pub use handler::{HandlerData, HandlerKind, HandlerRef, Hdl, Status};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorConfigBuilder, ShutdownHandle};
pub use process::{Process, ProcessId, StepTable};
pub use ring::{ConcurrentRingBuffer, Full, RingBuffer, QUEUE_CAPACITY};
pub use step::{Step, StepOutput, StepResult};
pub use time::{ManualClock, SystemClock, TimeSource};
pub use transport::{Request, ThreadQueues};
pub use worker::WorkerLoop;

#[cfg(test)]
mod tests;
