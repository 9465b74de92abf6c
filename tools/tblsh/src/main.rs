use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;
use tbl::services::LogLevel;
use tbl::{Orchestrator, OrchestratorConfig};
use tblsh::{spawn_stdin_reader, Cmdline, CommandTable};

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive shell on the tbl cooperative kernel")]
struct Opts {
    /// Number of worker threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Thread the command line process runs on.
    #[arg(long = "cmd-thread", default_value_t = 1, value_name = "N")]
    cmd_thread: usize,

    /// Heartbeat period of the command line process.
    #[arg(long = "cycle-ms", default_value_t = 500, value_name = "MS")]
    cycle_ms: u64,

    /// Worker tick period.
    #[arg(long = "tick-us", default_value_t = 1000, value_name = "US")]
    tick_us: u64,

    #[arg(long = "log-dir", default_value = "log", value_name = "DIR")]
    log_dir: PathBuf,

    /// Threshold for lines written to the log file.
    #[arg(long = "log-level", default_value = "message", value_name = "LEVEL")]
    log_level: LogLevel,
}

impl Opts {
    fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig::builder()
            .threads(self.threads)
            .tick(Duration::from_micros(self.tick_us))
            .log_dir(self.log_dir.clone())
            .log_level(self.log_level)
            .build()
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();
    ensure!(opts.cycle_ms > 0, "--cycle-ms must be positive");

    let mut orchestrator = Orchestrator::new(opts.config()).context("invalid configuration")?;
    let lines = spawn_stdin_reader().context("failed to start the console reader")?;
    let commands = CommandTable::builtin().context("failed to compile the command table")?;
    let cmdline = Cmdline::new(commands, lines, orchestrator.shutdown_handle());
    orchestrator
        .register(cmdline, opts.cmd_thread, Duration::from_millis(opts.cycle_ms))
        .with_context(|| format!("cannot place the command line on thread {}", opts.cmd_thread))?;

    orchestrator.establish()?;
    info!("tblsh running on {} threads, type `help` for commands", opts.threads);
    orchestrator.run()?;
    Ok(())
}
