//! Tests for OrchestratorConfig builder and validation.

use core::time::Duration;
use std::path::Path;

use tbl::services::LogLevel;
use tbl::{ManualClock, Orchestrator, OrchestratorConfig, TblError, QUEUE_CAPACITY};

#[test]
fn orchestrator_config_default() {
    let config = OrchestratorConfig::default();

    assert_eq!(config.threads, 1);
    assert_eq!(config.tick, Duration::from_millis(1));
    assert_eq!(config.queue_capacity, QUEUE_CAPACITY);
    assert_eq!(config.log_dir, Path::new("log"));
    assert_eq!(config.log_level, LogLevel::Message);
    assert_eq!(config.error_cycle, Duration::from_millis(1));
    assert_eq!(config.clock_cycle, Duration::from_millis(1));
    assert_eq!(config.fileio_cycle, Duration::from_millis(100));
    assert_eq!(config.log_cycle, Duration::from_millis(100));
}

#[test]
fn orchestrator_config_builder() {
    let clock = ManualClock::new();
    let config = OrchestratorConfig::builder()
        .threads(3)
        .tick(Duration::from_micros(500))
        .queue_capacity(64)
        .log_dir("/tmp/tbl-logs")
        .log_level(LogLevel::Warning)
        .builtin_cycles(
            Duration::from_millis(2),
            Duration::from_millis(3),
            Duration::from_millis(4),
            Duration::from_millis(5),
        )
        .time_source(std::sync::Arc::new(clock.clone()))
        .build();

    assert_eq!(config.threads, 3);
    assert_eq!(config.tick, Duration::from_micros(500));
    assert_eq!(config.queue_capacity, 64);
    assert_eq!(config.log_dir, Path::new("/tmp/tbl-logs"));
    assert_eq!(config.log_level, LogLevel::Warning);
    assert_eq!(config.clock_cycle, Duration::from_millis(3));
    assert_eq!(config.log_cycle, Duration::from_millis(5));

    clock.advance(Duration::from_secs(2));
    assert_eq!(config.time.monotonic(), Duration::from_secs(2));
}

#[test]
fn orchestrator_registers_builtins_on_thread_zero() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::builder().threads(2).build())
        .expect("valid configuration");

    let names: Vec<_> = orchestrator
        .transport()
        .registrations()
        .iter()
        .map(|registration| (registration.process.name(), registration.thread))
        .collect();
    assert_eq!(names, [("Error", 0), ("Clock", 0), ("FileIO", 0), ("Log", 0)]);
    assert_eq!(orchestrator.transport().thread_count(), 2);
    assert!(!orchestrator.is_established());
}

#[test]
fn invalid_sizes_are_rejected() {
    let zero_threads = Orchestrator::new(OrchestratorConfig::builder().threads(0).build());
    assert!(matches!(zero_threads, Err(TblError::InvalidThreadCount(0))));

    let tiny_queues = Orchestrator::new(OrchestratorConfig::builder().queue_capacity(1).build());
    assert!(matches!(tiny_queues, Err(TblError::InvalidCapacity(1))));
}
