//! Collaboration: encrypted scene broadcast and last-writer-wins merge.
//!
//! Each peer broadcasts the elements whose version moved past what it last
//! sent, shortly after a local commit, and the whole scene on a fixed
//! interval. Incoming elements replace local ones when their version is
//! higher, with the version nonce breaking ties, so every peer converges on
//! the same state regardless of delivery order.

mod cipher;
mod timer;
mod transport;
mod wire;

#[cfg(not(target_arch = "wasm32"))]
mod websocket;

pub use cipher::{IV_LENGTH, KEY_LENGTH, SceneCipher};
pub use timer::{DebounceTimer, IntervalTimer};
pub use transport::{MemoryNetwork, MemoryTransport, Transport, TransportError};
pub use wire::{CursorPosition, PayloadKind, PeerId, ScenePayload, WireMessage};

#[cfg(not(target_arch = "wasm32"))]
pub use websocket::{ConnectionState, WebSocketTransport, validate_url};

use crate::config::SyncConfig;
use crate::element::{Element, ElementId};
use crate::store::Scene;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Encryption failed")]
    Encryption,
    #[error("Decryption failed")]
    Decryption,
    #[error("Invalid key length: {0} bytes")]
    KeyLength(usize),
    #[error("Encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for synchronization.
pub type SyncResult<T> = Result<T, SyncError>;

/// Whether `incoming` should replace `local`.
pub fn remote_wins(local: &Element, incoming: &Element) -> bool {
    incoming.version() > local.version()
        || (incoming.version() == local.version()
            && incoming.version_nonce() > local.version_nonce())
}

/// Outcome of merging one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Known elements replaced by a newer remote state.
    pub updated: usize,
    /// Elements this peer had not seen.
    pub added: usize,
    /// Elements held back because a local gesture is editing them.
    pub locked: usize,
    /// Remote states that lost to the local one.
    pub stale: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.updated + self.added > 0
    }

    /// Add the counts of another merge.
    pub fn absorb(&mut self, other: &MergeReport) {
        self.updated += other.updated;
        self.added += other.added;
        self.locked += other.locked;
        self.stale += other.stale;
    }
}

/// Broadcast and merge state for one peer.
#[derive(Debug)]
pub struct Synchronizer {
    cipher: SceneCipher,
    /// Last version of each element sent or received.
    broadcasted_versions: HashMap<ElementId, u64>,
    last_scene_version: Option<u64>,
    /// Newest remote state of each element that arrived while locked.
    deferred: HashMap<ElementId, Element>,
    debounce: DebounceTimer,
    full_sync: IntervalTimer,
    full_sync_requested: bool,
}

impl Synchronizer {
    pub fn new(cipher: SceneCipher, config: &SyncConfig) -> Self {
        Self {
            cipher,
            broadcasted_versions: HashMap::new(),
            last_scene_version: None,
            deferred: HashMap::new(),
            debounce: DebounceTimer::new(config.debounce_ms),
            full_sync: IntervalTimer::new(config.full_sync_interval_ms),
            full_sync_requested: false,
        }
    }

    /// A local change was committed; broadcast it after the debounce delay.
    pub fn note_local_commit(&mut self, now: u64) {
        self.debounce.schedule(now);
    }

    /// Send the whole scene on the next tick, e.g. after joining a room.
    pub fn request_full_sync(&mut self) {
        self.full_sync_requested = true;
    }

    /// Last version sent or received for an element.
    pub fn broadcasted_version(&self, id: ElementId) -> Option<u64> {
        self.broadcasted_versions.get(&id).copied()
    }

    pub fn has_pending_broadcast(&self) -> bool {
        self.debounce.is_pending() || self.full_sync_requested
    }

    /// Run due broadcasts. Returns what was sent, if anything.
    pub fn tick(
        &mut self,
        now: u64,
        scene: &Scene,
        transport: &mut dyn Transport,
    ) -> SyncResult<Option<PayloadKind>> {
        if self.full_sync.fire(now) || self.full_sync_requested {
            self.full_sync_requested = false;
            self.full_sync.reset(now);
            self.debounce.cancel();
            return self.broadcast(PayloadKind::Full, scene, transport);
        }
        if self.debounce.fire(now) {
            return self.broadcast(PayloadKind::Delta, scene, transport);
        }
        Ok(None)
    }

    /// Encrypt and send the scene or its unsent changes. Versions are
    /// recorded only after the transport accepts the message.
    pub fn broadcast(
        &mut self,
        kind: PayloadKind,
        scene: &Scene,
        transport: &mut dyn Transport,
    ) -> SyncResult<Option<PayloadKind>> {
        let scene_version = scene.scene_version();
        let elements: Vec<Element> = match kind {
            PayloadKind::Full => scene.get_all().to_vec(),
            PayloadKind::Delta => {
                if self.last_scene_version == Some(scene_version) {
                    return Ok(None);
                }
                scene
                    .get_all()
                    .iter()
                    .filter(|e| {
                        self.broadcasted_versions
                            .get(&e.id())
                            .is_none_or(|sent| e.version() > *sent)
                    })
                    .cloned()
                    .collect()
            }
        };
        if kind == PayloadKind::Delta && elements.is_empty() {
            self.last_scene_version = Some(scene_version);
            return Ok(None);
        }

        let payload = ScenePayload {
            kind,
            scene_version,
            elements,
        };
        let sealed = self.cipher.encrypt(&serde_json::to_vec(&payload)?)?;
        let message = WireMessage::SceneUpdate {
            from: transport.peer_id().to_string(),
            payload: sealed,
        };
        if let Err(e) = transport.send(&message) {
            log::warn!(
                "Dropping {:?} update of {} element(s): {}",
                kind,
                payload.elements.len(),
                e
            );
            return Err(e.into());
        }
        for element in &payload.elements {
            self.record_version(element.id(), element.version());
        }
        self.last_scene_version = Some(scene_version);
        log::debug!(
            "Broadcast {:?} update with {} element(s)",
            kind,
            payload.elements.len()
        );
        Ok(Some(kind))
    }

    /// Decrypt a scene update and merge it. Cursor messages merge nothing.
    pub fn receive(
        &mut self,
        message: &WireMessage,
        scene: &mut Scene,
        locked: &HashSet<ElementId>,
    ) -> SyncResult<MergeReport> {
        let WireMessage::SceneUpdate { from, payload } = message else {
            return Ok(MergeReport::default());
        };
        let plaintext = self.cipher.decrypt(payload).inspect_err(|e| {
            log::debug!("Dropping update from {}: {}", from, e);
        })?;
        let payload: ScenePayload = serde_json::from_slice(&plaintext).inspect_err(|e| {
            log::debug!("Dropping malformed update from {}: {}", from, e);
        })?;
        let report = self.merge(payload.elements, scene, locked);
        log::debug!("Merged update from {}: {:?}", from, report);
        Ok(report)
    }

    /// Last-writer-wins merge. Local order is kept and unknown elements are
    /// appended on top.
    pub fn merge(
        &mut self,
        incoming: Vec<Element>,
        scene: &mut Scene,
        locked: &HashSet<ElementId>,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        let mut elements = scene.get_all().to_vec();
        let mut index: HashMap<ElementId, usize> =
            elements.iter().enumerate().map(|(i, e)| (e.id(), i)).collect();

        for remote in incoming {
            let id = remote.id();
            if locked.contains(&id) {
                self.defer(remote);
                report.locked += 1;
                continue;
            }
            let version = remote.version();
            match index.get(&id) {
                Some(&i) if remote_wins(&elements[i], &remote) => {
                    elements[i] = remote;
                    report.updated += 1;
                }
                Some(_) => {
                    report.stale += 1;
                    continue;
                }
                None => {
                    index.insert(id, elements.len());
                    elements.push(remote);
                    report.added += 1;
                }
            }
            // Received states need no echo back to the room.
            self.record_version(id, version);
        }

        if report.changed() {
            scene.replace_all(elements);
        }
        report
    }

    /// Merge the held-back states of elements no longer in `locked`.
    pub fn replay_deferred(&mut self, scene: &mut Scene, locked: &HashSet<ElementId>) -> MergeReport {
        if self.deferred.is_empty() {
            return MergeReport::default();
        }
        let ready: Vec<ElementId> = self
            .deferred
            .keys()
            .filter(|id| !locked.contains(id))
            .copied()
            .collect();
        let incoming: Vec<Element> = ready
            .iter()
            .filter_map(|id| self.deferred.remove(id))
            .collect();
        if incoming.is_empty() {
            return MergeReport::default();
        }
        log::debug!("Replaying {} deferred element(s)", incoming.len());
        self.merge(incoming, scene, locked)
    }

    /// Number of remote states waiting for a local gesture to end.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    fn defer(&mut self, remote: Element) {
        match self.deferred.get(&remote.id()) {
            Some(held) if !remote_wins(held, &remote) => {}
            _ => {
                self.deferred.insert(remote.id(), remote);
            }
        }
    }

    fn record_version(&mut self, id: ElementId, version: u64) {
        let entry = self.broadcasted_versions.entry(id).or_insert(version);
        *entry = (*entry).max(version);
    }
}
