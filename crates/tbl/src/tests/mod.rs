
use core::time::Duration;

use crate::handler::HandlerRef;
use crate::process::{boxed, Process, ProcessId, ProcessSlot};
use crate::sync::Arc;
use crate::transport::{ProcessRegistration, Request, Transport};
use crate::worker::WorkerLoop;

/// A single worker on thread 0, with routing done by hand.
struct Harness {
    transport: Arc<Transport>,
    worker: WorkerLoop,
}

impl Harness {
    fn new(slots: Vec<Box<dyn ProcessSlot>>) -> Self {
        let mut transport = Transport::new(1, 64);
        for slot in &slots {
            transport
                .register(ProcessRegistration {
                    process: slot.id(),
                    thread: 0,
                    cycle: Duration::from_millis(1),
                })
                .expect("registration should succeed");
        }
        let transport = Arc::new(transport);
        let worker = WorkerLoop::new(0, Arc::clone(&transport), slots, 64);
        Self { transport, worker }
    }

    fn submit<P: Process>(&self, handler: impl Into<HandlerRef>) {
        self.transport
            .deliver(Request::new(ProcessId::of::<P>(), handler))
            .expect("inbound queue has room");
    }

    /// Route, then tick.
    fn cycle(&mut self) {
        self.transport.route().expect("routing should succeed");
        self.worker.tick().expect("tick should succeed");
    }

    fn idle(&self) -> bool {
        let queues = self.transport.thread_queues(0);
        queues.inbound().is_empty()
            && queues.outbound().is_empty()
            && queues.interrupts().is_empty()
            && self.worker.stack_depth() == 0
    }
}

fn slot<P: Process>(process: P) -> Box<dyn ProcessSlot> {
    boxed(process).expect("process serves the required kinds")
}
