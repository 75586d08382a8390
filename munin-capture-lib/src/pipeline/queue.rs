use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::packet::Packet;

/// Unbounded per-worker FIFO. The producer pushes and broadcasts; the owning
/// worker is the only popper.
pub(crate) struct PacketQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

struct QueueState {
    packets: VecDeque<Packet>,
    shutdown: bool,
}

impl PacketQueue {
    pub(crate) fn new() -> Self {
        PacketQueue {
            state: Mutex::new(QueueState { packets: VecDeque::new(), shutdown: false }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn push(&self, packet: Packet) {
        self.lock().packets.push_back(packet);
        self.cond.notify_all();
    }

    /// Wait for one packet or one wakeup. Returns the popped packet (`None`
    /// on a bare wakeup, which the worker uses to drain pending commands) and
    /// whether shutdown has been requested.
    pub(crate) fn pop_wait(&self) -> (Option<Packet>, bool) {
        let mut state = self.lock();
        if state.packets.is_empty() && !state.shutdown {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        (state.packets.pop_front(), state.shutdown)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().packets.len()
    }

    pub(crate) fn wake(&self) {
        self.cond.notify_all();
    }

    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.cond.notify_all();
    }
}
