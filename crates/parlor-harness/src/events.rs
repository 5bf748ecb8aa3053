//! Event capture for room delivery assertions.

use parlor_core::{Outbox, RoomEvent};
use tokio::sync::mpsc;

/// A bounded outbox with its receiving end kept for assertions.
///
/// Tests hand [`EventSink::outbox`] to a join command, then drain to see
/// exactly what the room delivered and in which order. A small capacity
/// doubles as a slow-consumer simulation: once full, the room drops further
/// events for this member.
#[derive(Debug)]
pub struct EventSink {
    outbox: Outbox,
    events: mpsc::Receiver<RoomEvent>,
}

impl EventSink {
    /// Sink whose outbox holds at most `capacity` undrained events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (outbox, events) = mpsc::channel(capacity);
        Self { outbox, events }
    }

    /// Sender half to pass to a join command. May be cloned freely.
    #[must_use]
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Everything delivered so far, in delivery order. Does not wait.
    pub fn drain(&mut self) -> Vec<RoomEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Seqs of the drained [`RoomEvent::Message`] events, other event kinds
    /// skipped.
    pub fn drain_message_seqs(&mut self) -> Vec<u64> {
        self.drain()
            .iter()
            .filter_map(|event| match event {
                RoomEvent::Message(message) => Some(message.seq),
                _ => None,
            })
            .collect()
    }

    /// Wait for the next event. `None` once every outbox clone is dropped.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }
}
