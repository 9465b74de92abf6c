//! Error escalation and reset broadcasts, end to end.

mod common;

use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tbl::services::{ErrorEvent, ErrorId, ErrorLevel, ErrorProcess, ErrorStatus, ResetError};
use tbl::{step, Hdl, Process, StepContext, StepOutput, StepResult, StepTable};

use common::{drive_until, simulated};

const STEP: Duration = Duration::from_micros(100);

/// Acknowledges an `ErrorEvent` only after yielding a few times.
struct Stubborn {
    patience: u32,
    acknowledged: Arc<AtomicBool>,
}

impl Stubborn {
    fn error_event(&mut self, _ctx: &mut StepContext<'_>, _event: &mut ErrorEvent) -> StepOutput<Self, ErrorEvent> {
        if self.patience > 0 {
            self.patience -= 1;
            return Ok(StepResult::Yield);
        }
        self.acknowledged.store(true, Ordering::SeqCst);
        Ok(StepResult::Done)
    }
}

impl Process for Stubborn {
    const NAME: &'static str = "Stubborn";

    fn table(table: &mut StepTable<Self>) {
        table.defaults().on(step!(Self::error_event));
    }
}

fn query_status(orchestrator: &mut tbl::Orchestrator, clock: &tbl::ManualClock) -> Hdl<ErrorStatus> {
    let status = orchestrator
        .request_to::<ErrorProcess, _>(ErrorStatus::new())
        .expect("request should queue");
    drive_until(orchestrator, clock, STEP, 10_000, || status.is_terminal());
    status
}

#[test]
fn raised_level_interrupts_every_other_process() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let report = orchestrator
        .set_error(ErrorLevel::Fatal, ErrorId::RcError, "x")
        .expect("interrupt queue has room");
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || report.is_terminal());

    assert!(report.is_done());
    let report = report.lock();
    assert!(report.escalated());
    assert_eq!(report.events().len(), 3);
    for event in report.events() {
        assert!(event.is_done());
        assert_eq!(event.lock().level(), ErrorLevel::Fatal);
    }
}

#[test]
fn set_error_waits_for_a_slow_acknowledger() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    let acknowledged = Arc::new(AtomicBool::new(false));
    orchestrator
        .register(
            Stubborn {
                patience: 5,
                acknowledged: Arc::clone(&acknowledged),
            },
            0,
            Duration::from_millis(10),
        )
        .unwrap();
    orchestrator.establish().unwrap();

    let report = orchestrator
        .set_error(ErrorLevel::Cycle, ErrorId::RcError, "sensor timeout")
        .unwrap();
    orchestrator.step().unwrap();
    assert!(!report.is_terminal());
    assert!(!acknowledged.load(Ordering::SeqCst));

    drive_until(&mut orchestrator, &clock, STEP, 10_000, || {
        if report.is_terminal() {
            assert!(acknowledged.load(Ordering::SeqCst));
        }
        report.is_terminal()
    });

    assert!(report.is_done());
    let report = report.lock();
    assert_eq!(report.events().len(), 4);
    assert!(report.events().iter().all(Hdl::is_done));
}

#[test]
fn lower_level_is_recorded_without_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let fatal = orchestrator.set_error(ErrorLevel::Fatal, ErrorId::Undefined, "first").unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || fatal.is_terminal());
    let cycle = orchestrator.set_error(ErrorLevel::Cycle, ErrorId::RcError, "second").unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || cycle.is_terminal());

    assert!(!cycle.lock().escalated());
    assert!(cycle.lock().events().is_empty());

    let status = query_status(&mut orchestrator, &clock);
    let status = status.lock();
    assert_eq!(status.level(), ErrorLevel::Fatal);
    let messages: Vec<_> = status.records().iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, ["first", "second"]);
}

#[test]
fn reset_without_errors_then_escalate_from_none() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let reset = orchestrator
        .request_to::<ErrorProcess, _>(ResetError::new())
        .unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || reset.is_terminal());
    assert!(reset.is_done());
    assert_eq!(reset.lock().resets().len(), 3);
    assert!(reset.lock().resets().iter().all(Hdl::is_done));

    let status = query_status(&mut orchestrator, &clock);
    assert_eq!(status.lock().level(), ErrorLevel::None);
    assert!(status.lock().records().is_empty());

    let report = orchestrator.set_error(ErrorLevel::Cycle, ErrorId::RcError, "after reset").unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || report.is_terminal());
    assert!(report.lock().escalated());

    let status = query_status(&mut orchestrator, &clock);
    assert_eq!(status.lock().level(), ErrorLevel::Cycle);
}

#[test]
fn reset_clears_level_so_the_next_error_broadcasts_again() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    orchestrator.establish().unwrap();

    let first = orchestrator.set_error(ErrorLevel::Fatal, ErrorId::RcError, "boom").unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || first.is_terminal());

    let reset = orchestrator.request_to::<ErrorProcess, _>(ResetError::new()).unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || reset.is_terminal());

    let again = orchestrator.set_error(ErrorLevel::Fatal, ErrorId::RcError, "boom again").unwrap();
    drive_until(&mut orchestrator, &clock, STEP, 10_000, || again.is_terminal());
    assert!(again.lock().escalated());
    assert_eq!(again.lock().events().len(), 3);
}
