//! Handlers: one in-flight unit of work.
//!
//! A handler is created by its requester, travels through the queues as a
//! [`HandlerRef`], and is stepped by exactly one worker at a time. The
//! requester keeps a typed [`Hdl`] to poll [`Status`] and, once the status is
//! terminal, to read the outputs.
//!
//! Status is the only field other threads may look at while the handler is in
//! flight, so it lives in an atomic cell outside the data lock.

use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle of a handler.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Created, not yet admitted by a worker.
    Init = 0,
    /// Admitted; being stepped, preempted, or waiting in a queue after a yield.
    Running = 1,
    Done = 2,
    Failed = 3,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Init,
            1 => Self::Running,
            2 => Self::Done,
            _ => Self::Failed,
        }
    }
}

/// Atomic status cell shared between the executing worker and pollers.
pub struct StatusCell(AtomicU8);

impl StatusCell {
    fn new() -> Self {
        Self(AtomicU8::new(Status::Init as u8))
    }

    pub fn load(&self) -> Status {
        Status::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, status: Status) {
        self.0.store(status as u8, Ordering::Release);
    }
}

impl fmt::Debug for StatusCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(), f)
    }
}

/// Stable identifier of a handler type.
///
/// Step tables are keyed by kind. Application handlers use `User(n)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandlerKind {
    Main,
    ErrorEvent,
    Reset,
    SetError,
    ResetError,
    ErrorStatus,
    GetClock,
    GetTime,
    SleepSec,
    Open,
    Close,
    WriteLog,
    LogLevel,
    User(u16),
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "User({id:#06x})"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Private state of a handler type.
pub trait HandlerData: Send + 'static {
    const KIND: HandlerKind;
}

/// Shared storage behind a handler.
pub struct HandlerCell<T> {
    status: StatusCell,
    data: Mutex<T>,
}

impl<T: HandlerData> HandlerCell<T> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.data.lock()
    }
}

/// Object-safe view of a handler, used by queues and workers.
pub trait AnyHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;
    fn status_cell(&self) -> &StatusCell;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn status(&self) -> Status {
        self.status_cell().load()
    }
}

impl<T: HandlerData> AnyHandler for HandlerCell<T> {
    fn kind(&self) -> HandlerKind {
        T::KIND
    }

    fn status_cell(&self) -> &StatusCell {
        &self.status
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for dyn AnyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("kind", &self.kind())
            .field("status", &self.status())
            .finish()
    }
}

/// Type-erased handler reference carried by requests and frames.
pub type HandlerRef = Arc<dyn AnyHandler>;

/// Returns `true` when both references point at the same handler.
pub fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Typed handle to a handler.
pub struct Hdl<T>(Arc<HandlerCell<T>>);

impl<T: HandlerData> Hdl<T> {
    pub fn new(data: T) -> Self {
        Self(Arc::new(HandlerCell {
            status: StatusCell::new(),
            data: Mutex::new(data),
        }))
    }

    /// Recovers the typed handle from an erased reference.
    pub fn from_ref(handler: &HandlerRef) -> Option<Self> {
        Arc::clone(handler)
            .into_any()
            .downcast::<HandlerCell<T>>()
            .ok()
            .map(Self)
    }

    pub fn status(&self) -> Status {
        self.0.status.load()
    }

    pub fn is_done(&self) -> bool {
        self.status() == Status::Done
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Locks the handler data.
    ///
    /// Other threads should only do this once [`is_terminal`](Self::is_terminal)
    /// reports `true`; until then the executing worker may hold the lock for
    /// the duration of a step.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    pub fn handler(&self) -> HandlerRef {
        Arc::clone(&self.0) as HandlerRef
    }

    /// Returns `true` if `handler` refers to this handler.
    pub fn is(&self, handler: &HandlerRef) -> bool {
        same_handler(&self.handler(), handler)
    }
}

impl<T> Clone for Hdl<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: HandlerData> From<Hdl<T>> for HandlerRef {
    fn from(value: Hdl<T>) -> Self {
        value.0
    }
}

impl<T: HandlerData> From<&Hdl<T>> for HandlerRef {
    fn from(value: &Hdl<T>) -> Self {
        value.handler()
    }
}

impl<T: HandlerData> fmt::Debug for Hdl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hdl")
            .field("kind", &T::KIND)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(u32);

    impl HandlerData for Probe {
        const KIND: HandlerKind = HandlerKind::User(7);
    }

    struct Other;

    impl HandlerData for Other {
        const KIND: HandlerKind = HandlerKind::User(8);
    }

    #[test]
    fn new_handler_starts_in_init() {
        let hdl = Hdl::new(Probe(1));
        assert_eq!(hdl.status(), Status::Init);
        assert!(!hdl.is_terminal());
        assert_eq!(hdl.handler().kind(), HandlerKind::User(7));
    }

    #[test]
    fn erased_reference_round_trips_to_the_same_cell() {
        let hdl = Hdl::new(Probe(5));
        let erased: HandlerRef = hdl.handler();

        erased.status_cell().store(Status::Done);
        assert!(hdl.is_done());
        assert!(hdl.is(&erased));

        let typed = Hdl::<Probe>::from_ref(&erased).expect("same handler type");
        typed.lock().0 = 9;
        assert_eq!(hdl.lock().0, 9);

        assert!(Hdl::<Other>::from_ref(&erased).is_none());
    }

    #[test]
    fn user_kind_display_is_hex() {
        assert_eq!(HandlerKind::User(0x2a).to_string(), "User(0x002a)");
        assert_eq!(HandlerKind::SleepSec.to_string(), "SleepSec");
    }
}
