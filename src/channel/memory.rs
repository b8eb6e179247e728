//! In-process channel: the far end is a [`MemoryRemote`] handle held by the
//! caller. Used by tests and for loopback runs without network access.

use super::protocol::parse_server_message;
use super::{Channel, Connector, InboundEvent, MediaChunk};
use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::lock_or_recover;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<MediaChunk>>,
    inbound: Mutex<Option<Sender<InboundEvent>>>,
    closed: AtomicBool,
    opens: AtomicUsize,
    refuse: Mutex<Option<ChannelError>>,
}

/// Test-side handle: inspect what the session sent, inject what the server says.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to the most recently opened channel.
    pub fn push(&self, event: InboundEvent) -> bool {
        match lock_or_recover(&self.shared.inbound, "memory_inbound").as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Deliver a raw server message the way the WebSocket channel would,
    /// one event per decoded part. Returns how many events were delivered.
    pub fn push_server_message(&self, text: &str) -> Result<usize, serde_json::Error> {
        let mut delivered = 0;
        for event in parse_server_message(text)? {
            if self.push(event) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    pub fn sent(&self) -> Vec<MediaChunk> {
        lock_or_recover(&self.shared.sent, "memory_sent").clone()
    }

    pub fn sent_count(&self, audio: bool) -> usize {
        lock_or_recover(&self.shared.sent, "memory_sent")
            .iter()
            .filter(|chunk| chunk.is_audio() == audio)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Make the next open attempts fail with `err`.
    pub fn refuse_with(&self, err: Option<ChannelError>) {
        *lock_or_recover(&self.shared.refuse, "memory_refuse") = err;
    }
}

pub struct MemoryConnector {
    remote: MemoryRemote,
}

impl MemoryConnector {
    pub fn new(remote: MemoryRemote) -> Self {
        Self { remote }
    }
}

impl Connector for MemoryConnector {
    fn open(&self, _config: &ChannelConfig) -> Result<Box<dyn Channel>, ChannelError> {
        if let Some(err) = lock_or_recover(&self.remote.shared.refuse, "memory_refuse").clone() {
            return Err(err);
        }
        let (tx, rx) = unbounded();
        *lock_or_recover(&self.remote.shared.inbound, "memory_inbound") = Some(tx);
        lock_or_recover(&self.remote.shared.sent, "memory_sent").clear();
        self.remote.shared.closed.store(false, Ordering::SeqCst);
        self.remote.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryChannel {
            shared: self.remote.shared.clone(),
            events: rx,
            closed: false,
        }))
    }
}

struct MemoryChannel {
    shared: Arc<Shared>,
    events: Receiver<InboundEvent>,
    closed: bool,
}

impl Channel for MemoryChannel {
    fn send(&mut self, chunk: MediaChunk) {
        if self.closed {
            return;
        }
        lock_or_recover(&self.shared.sent, "memory_sent").push(chunk);
    }

    fn try_recv(&mut self) -> Option<InboundEvent> {
        self.events.try_recv().ok()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
