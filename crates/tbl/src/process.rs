//! Processes and their step tables.
//!
//! A process is a registered unit of behaviour identified by its type. It
//! owns a [`StepTable`] mapping each [`HandlerKind`] it serves to the entry
//! step for that kind. The table is built once, when the process is
//! registered, and is never consulted by type at dispatch time.

use core::any::{Any, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::HashMap;

use crate::context::SetupContext;
use crate::error::TblError;
use crate::handler::{HandlerData, HandlerKind};
use crate::services::escalation::{ErrorEvent, Reset};
use crate::services::heartbeat;
use crate::step::{Step, StepCursor, StepResult, TypedCursor};

/// Handler kinds every process must serve.
pub const REQUIRED_KINDS: [HandlerKind; 3] =
    [HandlerKind::Main, HandlerKind::ErrorEvent, HandlerKind::Reset];

/// Identity of a process type.
#[derive(Clone, Copy)]
pub struct ProcessId {
    type_id: TypeId,
    name: &'static str,
}

impl ProcessId {
    pub fn of<P: Process>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: P::NAME,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ProcessId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ProcessId {}

impl Hash for ProcessId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProcessId").field(&self.name).finish()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Trait implemented by application processes.
pub trait Process: Send + Sized + 'static {
    const NAME: &'static str;

    /// Fills in the entry step for every handler kind this process serves.
    fn table(table: &mut StepTable<Self>);

    /// Runs once on the owning worker's thread layout during `establish`,
    /// before the first `Main` request is queued.
    fn setup(&mut self, _ctx: &SetupContext<'_>) -> Result<(), TblError> {
        Ok(())
    }
}

type Entry = Box<dyn Fn() -> Box<dyn StepCursor> + Send + Sync>;

/// Handler kind to entry step mapping of one process.
pub struct StepTable<P> {
    entries: HashMap<HandlerKind, (&'static str, Entry)>,
    _process: core::marker::PhantomData<fn(&mut P)>,
}

impl<P: Process> StepTable<P> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            _process: core::marker::PhantomData,
        }
    }

    /// Registers `step` as the entry point for handlers of type `T`,
    /// replacing any earlier entry for the same kind.
    pub fn on<T: HandlerData>(&mut self, step: Step<P, T>) -> &mut Self {
        let entry: Entry = Box::new(move || -> Box<dyn StepCursor> { Box::new(TypedCursor::new(step)) });
        self.entries.insert(T::KIND, (step.name(), entry));
        self
    }

    /// Installs the stock heartbeat `Main` and the acknowledge-and-finish
    /// `ErrorEvent` and `Reset` handling.
    pub fn defaults(&mut self) -> &mut Self {
        self.on(heartbeat::entry::<P>())
            .on(Step::new("error_event", acknowledge_error_event::<P>))
            .on(Step::new("reset", acknowledge_reset::<P>))
    }

    pub fn contains(&self, kind: HandlerKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn entry_name(&self, kind: HandlerKind) -> Option<&'static str> {
        self.entries.get(&kind).map(|(name, _)| *name)
    }

    /// First required kind this table does not serve.
    pub fn missing(&self) -> Option<HandlerKind> {
        REQUIRED_KINDS.into_iter().find(|kind| !self.contains(*kind))
    }

    pub(crate) fn begin(&self, kind: HandlerKind) -> Option<Box<dyn StepCursor>> {
        self.entries.get(&kind).map(|(_, entry)| entry())
    }
}

impl<P: Process> Default for StepTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn acknowledge_error_event<P>(
    _process: &mut P,
    _ctx: &mut crate::context::StepContext<'_>,
    _event: &mut ErrorEvent,
) -> crate::step::StepOutput<P, ErrorEvent> {
    Ok(StepResult::Done)
}

fn acknowledge_reset<P>(
    _process: &mut P,
    _ctx: &mut crate::context::StepContext<'_>,
    _reset: &mut Reset,
) -> crate::step::StepOutput<P, Reset> {
    Ok(StepResult::Done)
}

/// Object-safe interface the worker uses to drive a process.
pub(crate) trait ProcessSlot: Send {
    fn id(&self) -> ProcessId;
    fn begin(&self, kind: HandlerKind) -> Option<Box<dyn StepCursor>>;
    fn setup(&mut self, ctx: &SetupContext<'_>) -> Result<(), TblError>;
    fn state_mut(&mut self) -> &mut dyn Any;
}

/// A process together with its resolved step table.
pub(crate) struct Slot<P: Process> {
    process: P,
    table: StepTable<P>,
}

impl<P: Process> Slot<P> {
    /// Builds the step table and checks that `P` serves every required kind.
    pub(crate) fn new(process: P) -> Result<Self, TblError> {
        let mut table = StepTable::new();
        P::table(&mut table);
        if let Some(kind) = table.missing() {
            return Err(TblError::MissingCapability {
                process: ProcessId::of::<P>(),
                kind,
            });
        }
        Ok(Self { process, table })
    }
}

impl<P: Process> ProcessSlot for Slot<P> {
    fn id(&self) -> ProcessId {
        ProcessId::of::<P>()
    }

    fn begin(&self, kind: HandlerKind) -> Option<Box<dyn StepCursor>> {
        self.table.begin(kind)
    }

    fn setup(&mut self, ctx: &SetupContext<'_>) -> Result<(), TblError> {
        self.process.setup(ctx)
    }

    fn state_mut(&mut self) -> &mut dyn Any {
        &mut self.process
    }
}

pub(crate) fn boxed<P: Process>(process: P) -> Result<Box<dyn ProcessSlot>, TblError> {
    Ok(Box::new(Slot::new(process)?))
}
