//! Clock, FileIO and Log processes driven through the orchestrator.

mod common;

use core::time::Duration;
use std::fs;

use tbl::services::{
    Close, ClockProcess, FileIoProcess, GetClock, GetTime, LogLevel, LogProcess, Open, OpenMode, SetLogLevel,
    SleepSec, WriteLog,
};
use tbl::{ManualClock, Status};

use common::{drive_until, simulated};

const STEP: Duration = Duration::from_micros(10);

#[test]
fn clock_reports_simulated_time() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();
    clock.advance(Duration::from_millis(250));

    let now = orchestrator.request_to::<ClockProcess, _>(GetClock::new()).unwrap();
    let wall = orchestrator.request_to::<ClockProcess, _>(GetTime::new()).unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || now.is_done() && wall.is_done());

    assert!(now.lock().clock() >= Duration::from_millis(250));
    assert!(wall.lock().time() >= ManualClock::DEFAULT_EPOCH + Duration::from_millis(250));
}

#[test]
fn sleep_finishes_only_after_its_duration() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let sleep = orchestrator
        .request_to::<ClockProcess, _>(SleepSec::new(Duration::from_millis(30)))
        .unwrap();
    let start = clock.clone();
    drive_until(&mut orchestrator, &clock, Duration::from_micros(100), 10_000, || {
        sleep.is_terminal()
    });

    assert!(sleep.is_done());
    assert!(tbl::TimeSource::monotonic(&start) >= Duration::from_millis(30));
}

#[test]
fn zero_sleep_finishes_in_the_tick_it_is_admitted() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let sleep = orchestrator.request_to::<ClockProcess, _>(SleepSec::from_secs_f64(0.0)).unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 100, || sleep.is_terminal());
    assert_eq!(sleep.status(), Status::Done);
}

#[test]
fn open_missing_file_reports_failure_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let open = orchestrator
        .request_to::<FileIoProcess, _>(Open::new(dir.path().join("missing.txt"), OpenMode::Read))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 1_000, || open.is_terminal());

    assert!(open.is_done());
    assert!(!open.lock().success());
    assert!(open.lock().file().is_none());
}

#[test]
fn open_is_cached_until_closed() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();
    let path = dir.path().join("nested").join("data.txt");

    let first = orchestrator
        .request_to::<FileIoProcess, _>(Open::new(&path, OpenMode::Append))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 1_000, || first.is_terminal());
    let second = orchestrator
        .request_to::<FileIoProcess, _>(Open::new(&path, OpenMode::Append))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 1_000, || second.is_terminal());

    assert!(path.exists());
    let first_file = first.lock().file().cloned().expect("opened");
    let second_file = second.lock().file().cloned().expect("cached");
    assert!(std::sync::Arc::ptr_eq(&first_file, &second_file));

    let close = orchestrator.request_to::<FileIoProcess, _>(Close::new(&path)).unwrap();
    let close_again = orchestrator.request_to::<FileIoProcess, _>(Close::new(&path)).unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 1_000, || {
        close.is_terminal() && close_again.is_terminal()
    });
    assert!(close.lock().success());
    assert!(close_again.lock().success());

    let reopened = orchestrator
        .request_to::<FileIoProcess, _>(Open::new(&path, OpenMode::Read))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 1_000, || reopened.is_terminal());
    let reopened_file = reopened.lock().file().cloned().expect("reopened");
    assert!(!std::sync::Arc::ptr_eq(&first_file, &reopened_file));
}

#[test]
fn log_lines_are_filtered_and_formatted() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();
    let path = dir
        .path()
        .join(format!("{}.log", ManualClock::DEFAULT_EPOCH.as_secs()));

    let debug = orchestrator
        .request_to::<LogProcess, _>(WriteLog::new(LogLevel::Debug, "noise"))
        .unwrap();
    let warning = orchestrator
        .request_to::<LogProcess, _>(WriteLog::new(LogLevel::Warning, "disk almost full"))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || {
        debug.is_terminal() && warning.is_terminal()
    });

    assert!(debug.is_done());
    assert!(!debug.lock().written());
    assert!(warning.is_done());
    assert!(warning.lock().written());
    let contents = fs::read_to_string(&path).unwrap();
    let secs = ManualClock::DEFAULT_EPOCH.as_secs();
    assert_eq!(contents, format!("{secs} [WARNING] disk almost full\n"));

    let lower = orchestrator
        .request_to::<LogProcess, _>(SetLogLevel::new(LogLevel::Debug))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 1_000, || lower.is_terminal());
    let debug = orchestrator
        .request_to::<LogProcess, _>(WriteLog::new(LogLevel::Debug, "now visible"))
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || debug.is_terminal());

    assert!(debug.lock().written());
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.ends_with(&format!("{secs} [DEBUG] now visible\n")));
}
