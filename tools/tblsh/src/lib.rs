//! Interactive shell on top of the `tbl` kernel.
//!
//! The [`Cmdline`] process owns the console: it prompts, collects one line
//! per heartbeat and maps it through a [`CommandTable`] to requests on the
//! Error and Log processes.

pub mod cmdline;
pub mod commands;

pub use cmdline::{spawn_stdin_reader, Cmdline, Keyin, PROMPT};
pub use commands::{Command, CommandTable, Parsed};
