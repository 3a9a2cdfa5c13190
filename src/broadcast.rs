use crate::protocol::ServerMessage;
use crate::types::{Address, RoomId};
use tokio::sync::broadcast;

/// Where an engine event is addressed: every observer of a room, or one
/// specific transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Room(RoomId),
    Player(Address),
}

/// Addressed event as it leaves the engine.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: Recipient,
    pub msg: ServerMessage,
}

/// Fire-and-forget event delivery. The engine owes no delivery guarantee;
/// implementations drop events when nobody is listening.
pub trait BroadcastSink: Send + Sync {
    fn emit(&self, to: Recipient, msg: ServerMessage);
}

/// Sink backed by a tokio broadcast channel. Each WebSocket connection
/// subscribes and forwards the envelopes addressed to it.
pub struct ChannelSink {
    tx: broadcast::Sender<Envelope>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

impl BroadcastSink for ChannelSink {
    fn emit(&self, to: Recipient, msg: ServerMessage) {
        // No receivers connected is fine
        let _ = self.tx.send(Envelope { to, msg });
    }
}

/// Records every emitted event; used by tests to assert on engine output.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<Envelope>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Envelope> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    pub fn snapshot(&self) -> Vec<Envelope> {
        self.events.lock().unwrap().clone()
    }
}

impl BroadcastSink for MemorySink {
    fn emit(&self, to: Recipient, msg: ServerMessage) {
        self.events.lock().unwrap().push(Envelope { to, msg });
    }
}
