#![allow(dead_code)]

use core::time::Duration;
use std::path::Path;
use std::sync::Arc;

use tbl::{ManualClock, Orchestrator, OrchestratorConfig};

/// Single-threaded orchestrator on simulated time.
pub fn simulated(log_dir: &Path) -> (Orchestrator, ManualClock) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = ManualClock::new();
    let config = OrchestratorConfig::builder()
        .log_dir(log_dir)
        .time_source(Arc::new(clock.clone()))
        .build();
    let orchestrator = Orchestrator::new(config).expect("valid configuration");
    (orchestrator, clock)
}

/// Steps thread 0, advancing `clock` by `per_step` each time, until `done`
/// holds. Panics after `limit` steps.
pub fn drive_until(
    orchestrator: &mut Orchestrator,
    clock: &ManualClock,
    per_step: Duration,
    limit: usize,
    mut done: impl FnMut() -> bool,
) -> usize {
    for steps in 0..limit {
        if done() {
            return steps;
        }
        clock.advance(per_step);
        orchestrator.step().expect("step should succeed");
    }
    panic!("condition not reached within {limit} steps");
}

/// Steps thread 0 exactly `steps` times.
pub fn drive_for(orchestrator: &mut Orchestrator, clock: &ManualClock, per_step: Duration, steps: usize) {
    for _ in 0..steps {
        clock.advance(per_step);
        orchestrator.step().expect("step should succeed");
    }
}
