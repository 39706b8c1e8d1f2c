use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::event::Event;
use crate::message::Message;

/// Default channel buffer size for tracker messages.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Capacity of the event broadcast; slow observers lag instead of blocking.
const EVENT_CAPACITY: usize = 1024;

/// The message bus between intake, resolvers, and the tracker.
///
/// Any number of producers hold a clone of `tracker_tx`; exactly one consumer
/// takes `tracker_rx`. Applied changes fan out through `events_tx`.
pub struct SnapBus {
    pub tracker_tx: mpsc::Sender<Message>,
    pub tracker_rx: Option<mpsc::Receiver<Message>>,

    pub events_tx: broadcast::Sender<Event>,
}

impl SnapBus {
    /// Create a new bus with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new bus with a custom buffer size.
    pub fn with_buffer_size(buffer: usize) -> Self {
        let (tracker_tx, tracker_rx) = mpsc::channel(buffer.max(1));
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        info!(buffer_size = buffer, "SnapBus initialized");

        Self {
            tracker_tx,
            tracker_rx: Some(tracker_rx),
            events_tx,
        }
    }

    /// Take the tracker receiver (can only be called once).
    pub fn take_tracker_rx(&mut self) -> Option<mpsc::Receiver<Message>> {
        debug!("Tracker receiver taken");
        self.tracker_rx.take()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events_tx.subscribe()
    }
}

impl Default for SnapBus {
    fn default() -> Self {
        Self::new()
    }
}
