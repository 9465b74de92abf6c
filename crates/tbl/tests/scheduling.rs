//! Heartbeats, routing and registration rules.

mod common;

use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tbl::services::heartbeat::{self, Main};
use tbl::{
    HandlerData, HandlerKind, Hdl, Orchestrator, OrchestratorConfig, Process, ProcessId, Request, Step,
    StepContext, StepOutput, StepTable, TblError,
};

use common::{drive_for, simulated};

/// Publishes its heartbeat counter, then runs the stock heartbeat.
struct Beating {
    beats: Arc<AtomicU64>,
}

impl Beating {
    fn main(&mut self, ctx: &mut StepContext<'_>, main: &mut Main) -> StepOutput<Self, Main> {
        self.beats.store(main.counter() + 1, Ordering::SeqCst);
        heartbeat::count_up(self, ctx, main)
    }
}

impl Process for Beating {
    const NAME: &'static str = "Beating";

    fn table(table: &mut StepTable<Self>) {
        table.defaults().on(Step::new("main", Self::main));
    }
}

struct Quiet;

impl Process for Quiet {
    const NAME: &'static str = "Quiet";

    fn table(table: &mut StepTable<Self>) {
        table.defaults();
    }
}

struct Far;

impl Process for Far {
    const NAME: &'static str = "Far";

    fn table(table: &mut StepTable<Self>) {
        table.defaults();
    }
}

struct Incomplete;

impl Process for Incomplete {
    const NAME: &'static str = "Incomplete";

    fn table(table: &mut StepTable<Self>) {
        table.on(heartbeat::entry());
    }
}

struct Ping;

impl HandlerData for Ping {
    const KIND: HandlerKind = HandlerKind::User(0x10);
}

#[test]
fn heartbeat_keeps_its_period_on_simulated_time() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, clock) = simulated(dir.path());
    let beats = Arc::new(AtomicU64::new(0));
    orchestrator
        .register(Beating { beats: Arc::clone(&beats) }, 0, Duration::from_millis(50))
        .unwrap();
    orchestrator.register(Quiet, 0, Duration::from_millis(50)).unwrap();
    orchestrator.establish().unwrap();

    // 25_000 steps of 20 µs: 500 ms of simulated time.
    drive_for(&mut orchestrator, &clock, Duration::from_micros(20), 25_000);

    let beats = beats.load(Ordering::SeqCst);
    assert!((9..=11).contains(&beats), "unexpected beat count {beats}");
}

#[test]
fn request_reaches_remote_inbound_after_one_routing_pass() {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::builder().threads(3).build()).unwrap();
    orchestrator.register(Far, 2, Duration::from_millis(10)).unwrap();
    let ping = Hdl::new(Ping);

    orchestrator
        .queues(1)
        .unwrap()
        .outbound()
        .enqueue(Request::new(ProcessId::of::<Far>(), &ping))
        .unwrap();
    assert!(orchestrator.queues(2).unwrap().inbound().is_empty());

    assert_eq!(orchestrator.route().unwrap(), 1);
    let inbound = orchestrator.queues(2).unwrap().inbound();
    assert_eq!(inbound.len(), 1);
    assert!(inbound.any(|request| ping.is(request.handler())));
    assert!(orchestrator.queues(1).unwrap().outbound().is_empty());
}

#[test]
fn registration_rules() {
    let mut orchestrator = Orchestrator::new(OrchestratorConfig::builder().threads(2).build()).unwrap();
    orchestrator.register(Quiet, 1, Duration::from_millis(10)).unwrap();

    assert!(matches!(
        orchestrator.register(Quiet, 0, Duration::from_millis(10)),
        Err(TblError::DuplicateProcess(id)) if id == ProcessId::of::<Quiet>()
    ));
    assert!(matches!(
        orchestrator.register(Far, 2, Duration::from_millis(10)),
        Err(TblError::InvalidThread { thread: 2, threads: 2, .. })
    ));
    assert!(matches!(
        orchestrator.register(Incomplete, 0, Duration::from_millis(10)),
        Err(TblError::MissingCapability { kind: HandlerKind::ErrorEvent, .. })
    ));
    assert!(matches!(
        orchestrator.register(tbl::services::ClockProcess::default(), 0, Duration::from_millis(1)),
        Err(TblError::DuplicateProcess(_))
    ));
}

#[test]
fn lifecycle_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, _clock) = simulated(dir.path());

    assert!(matches!(orchestrator.step(), Err(TblError::NotEstablished)));
    orchestrator.establish().unwrap();
    assert!(matches!(orchestrator.establish(), Err(TblError::AlreadyEstablished)));
    assert!(matches!(
        orchestrator.register(Quiet, 0, Duration::from_millis(10)),
        Err(TblError::AlreadyEstablished)
    ));
}

#[test]
fn establish_queues_one_main_per_process_in_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orchestrator, _clock) = simulated(dir.path());
    orchestrator.register(Quiet, 0, Duration::from_millis(10)).unwrap();
    orchestrator.establish().unwrap();

    let inbound = orchestrator.queues(0).unwrap().inbound();
    let mut targets = Vec::new();
    while let Some(request) = inbound.dequeue() {
        assert_eq!(request.handler().kind(), HandlerKind::Main);
        targets.push(request.target().name());
    }
    assert_eq!(targets, ["Error", "Clock", "FileIO", "Log", "Quiet"]);
}
