//! Duplex connection to the remote live session.
//!
//! A [`Connector`] opens one [`Channel`] per session. Outbound media goes in
//! through [`Channel::send`] without blocking; inbound events come out of a
//! single ordered queue via [`Channel::try_recv`]. Channels are never reused.

mod memory;
pub mod protocol;
mod websocket;
#[cfg(test)]
mod tests;

use crate::config::ChannelConfig;
use crate::error::ChannelError;
use std::time::Instant;

pub use memory::{MemoryConnector, MemoryRemote};
pub use websocket::{redact_key, session_url, WebSocketConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    AudioPcm { sample_rate: u32 },
    VideoFrame,
}

/// One outbound unit of captured media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    pub kind: ChunkKind,
    pub bytes: Vec<u8>,
    pub captured_at: Instant,
}

impl MediaChunk {
    pub fn audio(bytes: Vec<u8>, sample_rate: u32, captured_at: Instant) -> Self {
        Self {
            kind: ChunkKind::AudioPcm { sample_rate },
            bytes,
            captured_at,
        }
    }

    pub fn video(bytes: Vec<u8>, captured_at: Instant) -> Self {
        Self {
            kind: ChunkKind::VideoFrame,
            bytes,
            captured_at,
        }
    }

    pub fn mime_type(&self) -> String {
        match self.kind {
            ChunkKind::AudioPcm { sample_rate } => format!("audio/pcm;rate={sample_rate}"),
            ChunkKind::VideoFrame => "image/jpeg".to_string(),
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, ChunkKind::AudioPcm { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    AudioPayload(Vec<u8>),
    SessionOpened,
    SessionClosed(String),
    SessionError(String),
}

pub trait Channel: Send {
    /// Queue a chunk for transmission. Never blocks; chunks sent after close are dropped.
    fn send(&mut self, chunk: MediaChunk);

    /// Next inbound event, in arrival order.
    fn try_recv(&mut self) -> Option<InboundEvent>;

    /// Safe to call any number of times.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

pub trait Connector {
    /// Block until the transport is up, or fail.
    fn open(&self, config: &ChannelConfig) -> Result<Box<dyn Channel>, ChannelError>;
}
