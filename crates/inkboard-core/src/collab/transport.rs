//! Message transport between peers.

use super::wire::{PeerId, WireMessage};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Send failed: {0}")]
    Send(String),
}

/// A connection to the other peers of a room.
pub trait Transport {
    /// This peer's id, stamped on outgoing messages.
    fn peer_id(&self) -> &str;

    /// Broadcast a message to every other peer.
    fn send(&mut self, message: &WireMessage) -> Result<(), TransportError>;

    /// Drain received messages (non-blocking).
    fn poll(&mut self) -> Vec<WireMessage>;
}

#[derive(Debug, Default)]
struct Mailbox {
    online: bool,
    inbox: VecDeque<WireMessage>,
}

/// In-process relay for tests and simulations. Messages sent while a peer is
/// offline never reach it, like a real socket.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    peers: Rc<RefCell<HashMap<PeerId, Mailbox>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the network as `peer_id`.
    pub fn connect(&self, peer_id: impl Into<PeerId>) -> MemoryTransport {
        let peer_id = peer_id.into();
        self.peers.borrow_mut().insert(
            peer_id.clone(),
            Mailbox {
                online: true,
                inbox: VecDeque::new(),
            },
        );
        MemoryTransport {
            peer_id,
            peers: Rc::clone(&self.peers),
        }
    }

    /// Messages waiting for a peer.
    pub fn pending(&self, peer_id: &str) -> usize {
        self.peers.borrow().get(peer_id).map_or(0, |m| m.inbox.len())
    }
}

/// One peer's end of a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    peer_id: PeerId,
    peers: Rc<RefCell<HashMap<PeerId, Mailbox>>>,
}

impl MemoryTransport {
    /// Take the peer off or back on the network.
    pub fn set_online(&mut self, online: bool) {
        if let Some(mailbox) = self.peers.borrow_mut().get_mut(&self.peer_id) {
            mailbox.online = online;
            if !online {
                mailbox.inbox.clear();
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.peers
            .borrow()
            .get(&self.peer_id)
            .is_some_and(|m| m.online)
    }
}

impl Transport for MemoryTransport {
    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn send(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        if !self.is_online() {
            return Err(TransportError::NotConnected);
        }
        let mut peers = self.peers.borrow_mut();
        for (id, mailbox) in peers.iter_mut() {
            if *id != self.peer_id && mailbox.online {
                mailbox.inbox.push_back(message.clone());
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<WireMessage> {
        self.peers
            .borrow_mut()
            .get_mut(&self.peer_id)
            .map(|m| m.inbox.drain(..).collect())
            .unwrap_or_default()
    }
}
