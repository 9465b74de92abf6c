//! Built-in processes, registered on thread 0 of every orchestrator.
//!
//! Their bodies are ordinary step functions; they exist so that applications
//! can sleep, log, touch files and escalate errors without ever blocking a
//! worker thread.

pub mod clock;
pub mod escalation;
pub mod fileio;
pub mod heartbeat;
pub mod logfile;

pub use clock::{ClockProcess, GetClock, GetTime, SleepSec};
pub use escalation::{
    ErrorEvent, ErrorId, ErrorLevel, ErrorProcess, ErrorRecord, ErrorStatus, Reset, ResetError, SetError,
};
pub use fileio::{Close, FileIoProcess, Open, OpenMode, SharedFile};
pub use heartbeat::Main;
pub use logfile::{LogLevel, LogProcess, SetLogLevel, WriteLog};
