//! Engine Events
//!
//! Lifecycle notifications from the engine to the host, carried over an
//! rtrb SPSC ring. Sends are lossy: if the host does not drain the queue,
//! newer events are dropped rather than blocking a transition.

use rtrb::{Consumer, Producer, RingBuffer};

use super::backend::StreamDirection;
use super::error::AudioError;

/// Default capacity of the event queue.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Lifecycle transitions reported to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Both streams are open and running.
    Started {
        sample_rate: u32,
        channels: usize,
    },
    /// Both streams were closed.
    Stopped,
    /// A start attempt failed and the engine is stopped.
    StartFailed(AudioError),
    /// A stream reported that its device went away.
    Disconnected(StreamDirection),
    /// The engine restarted after a disconnect.
    Restarted,
    /// The restart after a disconnect failed; the engine stays stopped.
    RestartFailed(AudioError),
}

/// Creates a connected sender/receiver pair.
pub fn event_channel(capacity: usize) -> (EventSender, EngineEvents) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (EventSender { producer }, EngineEvents { consumer })
}

/// Engine-side end of the event queue.
pub struct EventSender {
    producer: Producer<EngineEvent>,
}

impl EventSender {
    /// Send an event, dropping it if the queue is full.
    pub fn send_lossy(&mut self, event: EngineEvent) {
        if let Err(rtrb::PushError::Full(event)) = self.producer.push(event) {
            log::debug!("Event queue full, dropping {:?}", event);
        }
    }

    /// Check how many events can still be queued.
    pub fn slots_available(&self) -> usize {
        self.producer.slots()
    }
}

/// Host-side end of the event queue.
pub struct EngineEvents {
    consumer: Consumer<EngineEvent>,
}

impl EngineEvents {
    /// Receive an event from the engine.
    /// Returns Some(event) if available, None if no events pending.
    pub fn recv_event(&mut self) -> Option<EngineEvent> {
        self.consumer.pop().ok()
    }

    /// Drain all pending events from the engine.
    pub fn drain_events(&mut self) -> impl Iterator<Item = EngineEvent> + '_ {
        std::iter::from_fn(|| self.recv_event())
    }

    /// Number of events waiting to be read.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}
