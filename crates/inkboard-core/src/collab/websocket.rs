//! WebSocket transport for native platforms.
//!
//! The socket lives on a background thread; the owning side talks to it over
//! channels so [`Transport::poll`] never blocks.

use super::transport::{Transport, TransportError};
use super::wire::{PeerId, WireMessage};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Events from the WebSocket thread.
#[derive(Debug)]
enum WsEvent {
    Connected,
    Disconnected,
    Received(WireMessage),
    Error(String),
}

/// Relay connection. The room is part of the URL.
pub struct WebSocketTransport {
    peer_id: PeerId,
    state: ConnectionState,
    cmd_tx: Option<Sender<WsCommand>>,
    event_rx: Option<Receiver<WsEvent>>,
    _thread: Option<JoinHandle<()>>,
}

/// Check that `url` is a ws:// or wss:// URL.
pub fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::InvalidUrl(format!(
            "Invalid WebSocket URL scheme: {}",
            other
        ))),
    }
}

impl WebSocketTransport {
    /// Start connecting to `url` in the background.
    pub fn connect(url: &str, peer_id: impl Into<PeerId>) -> Result<Self, TransportError> {
        let url = validate_url(url)?.to_string();
        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<WsEvent>();
        let handle = thread::spawn(move || run_socket(&url, cmd_rx, event_tx));
        Ok(Self {
            peer_id: peer_id.into(),
            state: ConnectionState::Connecting,
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
            _thread: Some(handle),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Close the socket. The thread exits on its own.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Transport for WebSocketTransport {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn send(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let json = message.to_json()?;
        let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(WsCommand::Send(json))
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn poll(&mut self) -> Vec<WireMessage> {
        let mut messages = Vec::new();
        let Some(rx) = self.event_rx.as_ref() else {
            return messages;
        };
        while let Ok(event) = rx.try_recv() {
            match event {
                WsEvent::Connected => self.state = ConnectionState::Connected,
                WsEvent::Disconnected => self.state = ConnectionState::Disconnected,
                WsEvent::Error(message) => {
                    log::error!("WebSocket error: {}", message);
                    self.state = ConnectionState::Error;
                }
                WsEvent::Received(message) => messages.push(message),
            }
        }
        messages
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<WsEvent>) {
    log::info!("WebSocket thread: connecting to {}", url);
    let (mut socket, response) = match connect(url) {
        Ok(ok) => ok,
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = event_tx.send(WsEvent::Error(format!("Connection failed: {}", e)));
            return;
        }
    };
    log::info!("WebSocket connected, status: {}", response.status());
    let _ = event_tx.send(WsEvent::Connected);

    // Short read timeout so the loop also services outgoing commands.
    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("WebSocket send error: {}", e);
                    break;
                }
            }
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Disconnected) => {
                log::info!("WebSocket command channel disconnected");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => match WireMessage::from_json(&txt) {
                Ok(message) => {
                    let _ = event_tx.send(WsEvent::Received(message));
                }
                Err(e) => log::warn!("Ignoring unparseable relay message: {}", e),
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(WsEvent::Disconnected);
}
