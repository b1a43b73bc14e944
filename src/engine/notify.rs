//! Hand-off of gdb stop notifications to a waiting continue.
//!
//! Every continue arms the notifier with a fresh one-shot channel. The gdb/mi listener
//! takes that channel when a stop arrives, so exactly one stop is delivered per continue
//! and a stop nobody waits for is dropped instead of being seen by the next continue.

use crate::engine::error::Error;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Execution stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopEvent {
    /// gdb breakpoint number, or the stop reason if a breakpoint is not the cause.
    pub id: String,
}

impl StopEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Clone, Default)]
pub struct StopNotifier {
    slot: Arc<Mutex<Option<SyncSender<StopEvent>>>>,
}

impl StopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<SyncSender<StopEvent>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a waiter for the next stop. Must be called before execution is resumed.
    pub fn arm(&self) -> StopWaiter {
        let (sender, receiver) = mpsc::sync_channel(1);
        if self.slot().replace(sender).is_some() {
            log::warn!(target: "engine", "previous stop waiter replaced before a stop arrived");
        }
        StopWaiter { receiver }
    }

    /// Forget the armed waiter, if any.
    pub fn disarm(&self) {
        self.slot().take();
    }

    /// Deliver a stop to the armed waiter. Return false if nobody was waiting.
    pub fn notify(&self, event: StopEvent) -> bool {
        let Some(sender) = self.slot().take() else {
            log::debug!(target: "engine", "stop {} without a waiter, dropped", event.id);
            return false;
        };
        sender.send(event).is_ok()
    }

    /// No more stops will ever arrive; a blocked waiter fails.
    pub fn close(&self) {
        self.disarm();
    }
}

/// Receiving side of a single armed continue.
pub struct StopWaiter {
    receiver: Receiver<StopEvent>,
}

impl StopWaiter {
    /// Block until the stop arrives. There is no timeout.
    pub fn wait(self) -> Result<StopEvent, Error> {
        self.receiver.recv().map_err(|_| Error::StopChannelClosed)
    }
}
