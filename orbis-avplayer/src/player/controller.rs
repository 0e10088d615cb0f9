//! Controller thread
//!
//! Delivers player events to the guest event callback off the caller's
//! thread. The controller lives for the whole session: it is spawned at init
//! and joined at close, so events raised while no playback is running
//! (STATE_READY after AddSource, STATE_STOP after Stop) are still delivered.

use crate::types::{Event, EventReplacement};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Controller wake-up interval for checking the stop flag
const CONTROLLER_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Source id reported with every event
const EVENT_SOURCE_ID: i32 = 0;

/// Cloneable handle used by the session and workers to raise events
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Queue an event for delivery; dropped silently once the controller exited
    pub fn notify(&self, event: Event) {
        trace!("Queueing event {:?}", event);
        let _ = self.tx.send(event);
    }
}

/// Controller thread state
pub(super) struct ControllerWorker {
    events: Receiver<Event>,
    callbacks: EventReplacement,
    stop: Arc<AtomicBool>,
}

impl ControllerWorker {
    pub fn new(callbacks: EventReplacement, stop: Arc<AtomicBool>) -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel();
        let worker = Self {
            events: rx,
            callbacks,
            stop,
        };
        (worker, EventSender { tx })
    }

    pub fn run(self) {
        debug!("Controller started");

        loop {
            match self.events.recv_timeout(CONTROLLER_POLL_INTERVAL) {
                Ok(event) => self.deliver(event),
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Flush what was raised before the stop request
        while let Ok(event) = self.events.try_recv() {
            self.deliver(event);
        }

        debug!("Controller exiting");
    }

    fn deliver(&self, event: Event) {
        match &self.callbacks.event_callback {
            Some(callback) => {
                trace!("Delivering event {:?} ({:#x})", event, event.id());
                callback(event.id(), EVENT_SOURCE_ID);
            }
            None => trace!("No event callback, dropping {:?}", event),
        }
    }
}
