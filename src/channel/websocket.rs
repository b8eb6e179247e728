//! WebSocket transport on a dedicated I/O thread.
//!
//! The socket is owned by one thread that alternates between flushing queued
//! outbound chunks and reading with a short timeout. The session loop talks to
//! it only through channels.

use super::protocol::{parse_server_message, realtime_input_message, setup_message};
use super::{Channel, Connector, InboundEvent, MediaChunk};
use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::log_debug;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

const READ_TIMEOUT: Duration = Duration::from_millis(20);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Build the connection URL with the API key as the `key` query parameter.
pub fn session_url(config: &ChannelConfig) -> Result<Url, ChannelError> {
    let mut url = Url::parse(&config.endpoint)
        .map_err(|_| ChannelError::InvalidEndpoint(config.endpoint.clone()))?;
    if !matches!(url.scheme(), "ws" | "wss") || url.host_str().is_none() {
        return Err(ChannelError::InvalidEndpoint(config.endpoint.clone()));
    }
    let key = config
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ChannelError::MissingApiKey)?;
    url.query_pairs_mut().append_pair("key", key);
    Ok(url)
}

/// Hide the API key in anything that might end up in a log.
pub fn redact_key(text: &str, key: Option<&str>) -> String {
    match key {
        Some(key) if !key.is_empty() => text.replace(key, "***"),
        _ => text.to_string(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, config: &ChannelConfig) -> Result<Box<dyn Channel>, ChannelError> {
        let url = session_url(config)?;
        let key = config.api_key.clone();
        let setup = setup_message(config);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (out_tx, out_rx) = unbounded::<MediaChunk>();
        let (event_tx, event_rx) = unbounded::<InboundEvent>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), ChannelError>>();

        let stop = shutdown.clone();
        let handle = thread::Builder::new()
            .name("voxlive-websocket".to_string())
            .spawn(move || {
                let _ = rustls::crypto::ring::default_provider().install_default();
                let mut socket = match open_socket(&url, &setup, key.as_deref()) {
                    Ok(socket) => socket,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() || stop.load(Ordering::SeqCst) {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return;
                }
                io_loop(&mut socket, &out_rx, &event_tx, &stop);
            })
            .map_err(|err| ChannelError::Connect(err.to_string()))?;

        match ready_rx.recv_timeout(config.connect_timeout) {
            Ok(Ok(())) => {
                log_debug("websocket channel open");
                Ok(Box::new(WebSocketChannel {
                    outbound: Some(out_tx),
                    events: event_rx,
                    shutdown,
                    handle: Some(handle),
                }))
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => {
                // The connect call cannot be interrupted; the thread exits once it returns.
                shutdown.store(true, Ordering::SeqCst);
                Err(ChannelError::Timeout(config.connect_timeout.as_millis() as u64))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(ChannelError::Connect("websocket thread exited".to_string()))
            }
        }
    }
}

fn open_socket(url: &Url, setup: &str, key: Option<&str>) -> Result<Socket, ChannelError> {
    let (mut socket, _response) = tungstenite::connect(url.as_str())
        .map_err(|err| ChannelError::Connect(redact_key(&err.to_string(), key)))?;
    set_read_timeout(&socket, Some(READ_TIMEOUT))
        .map_err(|err| ChannelError::Connect(err.to_string()))?;
    socket
        .send(Message::text(setup.to_string()))
        .map_err(|err| ChannelError::Connect(redact_key(&err.to_string(), key)))?;
    Ok(socket)
}

fn set_read_timeout(socket: &Socket, timeout: Option<Duration>) -> std::io::Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(timeout),
        MaybeTlsStream::Rustls(stream) => stream.get_ref().set_read_timeout(timeout),
        _ => Ok(()),
    }
}

fn handle_text(text: &str, events: &Sender<InboundEvent>) {
    match parse_server_message(text) {
        Ok(parsed) => {
            for event in parsed {
                let _ = events.send(event);
            }
        }
        Err(err) => log_debug(&format!("ignoring unparseable server message: {err}")),
    }
}

fn io_loop(
    socket: &mut Socket,
    outbound: &Receiver<MediaChunk>,
    events: &Sender<InboundEvent>,
    shutdown: &AtomicBool,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            let _ = socket.close(None);
            let _ = socket.flush();
            return;
        }
        while let Ok(chunk) = outbound.try_recv() {
            if let Err(err) = socket.send(Message::text(realtime_input_message(&chunk))) {
                let _ = events.send(InboundEvent::SessionError(format!("send failed: {err}")));
                return;
            }
        }
        match socket.read() {
            Ok(Message::Text(text)) => handle_text(text.as_str(), events),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_text(text, events),
                Err(_) => log_debug(&format!("ignoring {} byte binary frame", bytes.len())),
            },
            Ok(Message::Close(frame)) => {
                let reason = match frame {
                    Some(frame) if !frame.reason.is_empty() => {
                        format!("closed by server ({}): {}", u16::from(frame.code), frame.reason)
                    }
                    Some(frame) => format!("closed by server ({})", u16::from(frame.code)),
                    None => "closed by server".to_string(),
                };
                let _ = events.send(InboundEvent::SessionClosed(reason));
                let _ = socket.flush();
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                let _ = events.send(InboundEvent::SessionClosed("connection closed".to_string()));
                return;
            }
            Err(err) => {
                let _ = events.send(InboundEvent::SessionError(err.to_string()));
                return;
            }
        }
    }
}

struct WebSocketChannel {
    outbound: Option<Sender<MediaChunk>>,
    events: Receiver<InboundEvent>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Channel for WebSocketChannel {
    fn send(&mut self, chunk: MediaChunk) {
        if let Some(outbound) = self.outbound.as_ref() {
            let _ = outbound.send(chunk);
        }
    }

    fn try_recv(&mut self) -> Option<InboundEvent> {
        self.events.try_recv().ok()
    }

    fn close(&mut self) {
        if self.outbound.take().is_none() {
            return;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log_debug("websocket thread panicked");
            }
        }
        log_debug("websocket channel closed");
    }

    fn is_closed(&self) -> bool {
        self.outbound.is_none()
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.close();
    }
}
