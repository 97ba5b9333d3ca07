//! A collaborative editing session: one editor, one synchronizer and one
//! transport, driven by [`Session::poll`].

use crate::collab::{
    CursorPosition, MergeReport, PayloadKind, PeerId, SceneCipher, SyncResult, Synchronizer,
    Transport, TransportError, WireMessage,
};
use crate::interaction::Editor;
use kurbo::Point;
use std::collections::HashMap;

/// Last known pointer of a remote peer.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerCursor {
    pub position: Point,
    pub username: Option<String>,
}

/// What one [`Session::poll`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    pub merged: MergeReport,
    /// Scene updates that could not be decrypted or parsed.
    pub rejected: usize,
    pub sent: Option<PayloadKind>,
}

pub struct Session<T: Transport> {
    editor: Editor,
    sync: Synchronizer,
    transport: T,
    peers: HashMap<PeerId, PeerCursor>,
    username: Option<String>,
}

impl<T: Transport> Session<T> {
    /// Start a session. The local scene goes out in full on the first poll.
    pub fn new(editor: Editor, cipher: SceneCipher, transport: T) -> Self {
        let mut sync = Synchronizer::new(cipher, &editor.config().sync);
        sync.request_full_sync();
        log::info!("Collaboration session started as {}", transport.peer_id());
        Self {
            editor,
            sync,
            transport,
            peers: HashMap::new(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Known remote cursors by peer id.
    pub fn peer_cursors(&self) -> &HashMap<PeerId, PeerCursor> {
        &self.peers
    }

    /// Share the local pointer, in scene coordinates.
    pub fn send_cursor(&mut self, position: Point) -> Result<(), TransportError> {
        let message = WireMessage::PeerCursor {
            from: self.transport.peer_id().to_string(),
            cursor: CursorPosition {
                x: position.x,
                y: position.y,
            },
            username: self.username.clone(),
        };
        self.transport.send(&message)
    }

    /// Merge received messages, then run due broadcasts. Updates to elements
    /// under the local gesture are held back and merged once it ends. No
    /// history is recorded for merges.
    pub fn poll(&mut self, now: u64) -> PollReport {
        let mut report = PollReport::default();
        if self.editor.take_commits() > 0 {
            self.sync.note_local_commit(now);
        }

        let incoming = self.transport.poll();
        if !incoming.is_empty() || self.sync.deferred_len() > 0 {
            let locked = self.editor.locked_element_ids();
            self.editor.history_mut().suspend_recording();
            for message in &incoming {
                match self.receive(message, &locked) {
                    Ok(merged) => report.merged.absorb(&merged),
                    Err(_) => report.rejected += 1,
                }
            }
            let replayed = self.sync.replay_deferred(self.editor.scene_mut(), &locked);
            report.merged.absorb(&replayed);
            self.editor.history_mut().resume_recording();
            if report.merged.changed() {
                let selected = self.editor.selected_ids().to_vec();
                self.editor.set_selection(&selected);
            }
        }

        match self
            .sync
            .tick(now, self.editor.scene(), &mut self.transport)
        {
            Ok(sent) => report.sent = sent,
            Err(e) => log::debug!("Broadcast deferred: {}", e),
        }
        report
    }

    fn receive(
        &mut self,
        message: &WireMessage,
        locked: &std::collections::HashSet<crate::element::ElementId>,
    ) -> SyncResult<MergeReport> {
        match message {
            WireMessage::PeerCursor {
                from,
                cursor,
                username,
            } => {
                self.peers.insert(
                    from.clone(),
                    PeerCursor {
                        position: Point::new(cursor.x, cursor.y),
                        username: username.clone(),
                    },
                );
                Ok(MergeReport::default())
            }
            WireMessage::SceneUpdate { .. } => {
                self.sync.receive(message, self.editor.scene_mut(), locked)
            }
        }
    }

    /// Forget a peer's cursor, e.g. when the relay reports it left.
    pub fn remove_peer(&mut self, peer_id: &str) {
        self.peers.remove(peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{KEY_LENGTH, MemoryNetwork, MemoryTransport};
    use crate::element::Element;
    use crate::input::PointerEvent;

    fn session(network: &MemoryNetwork, id: &str) -> Session<MemoryTransport> {
        Session::new(
            Editor::default(),
            SceneCipher::new(&[9u8; KEY_LENGTH]),
            network.connect(id),
        )
    }

    #[test]
    fn test_initial_full_sync() {
        let network = MemoryNetwork::new();
        let mut a = session(&network, "a");
        let mut b = session(&network, "b");
        let id = a
            .editor_mut()
            .scene_mut()
            .insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        assert_eq!(a.poll(0).sent, Some(PayloadKind::Full));
        let report = b.poll(0);
        assert_eq!(report.merged.added, 1);
        assert!(b.editor().scene().contains(id));
        assert!(!b.editor().history().can_undo());
    }

    #[test]
    fn test_commit_is_debounced() {
        let network = MemoryNetwork::new();
        let mut a = session(&network, "a");
        let mut b = session(&network, "b");
        a.poll(0);
        b.poll(0);

        let id = a
            .editor_mut()
            .scene_mut()
            .insert(Element::rectangle(0.0, 0.0, 100.0, 100.0));
        a.editor_mut().pointer_down(PointerEvent::at(50.0, 50.0));
        a.editor_mut().pointer_move(PointerEvent::at(90.0, 50.0));
        a.editor_mut().pointer_up(PointerEvent::at(90.0, 50.0));

        assert_eq!(a.poll(1_000).sent, None);
        assert_eq!(a.poll(1_100).sent, Some(PayloadKind::Delta));
        b.poll(1_100);
        let remote = b.editor().scene().get(id).unwrap();
        assert!((remote.x - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_gesture_elements_are_not_overwritten() {
        let network = MemoryNetwork::new();
        let mut a = session(&network, "a");
        let mut b = session(&network, "b");
        let id = a
            .editor_mut()
            .scene_mut()
            .insert(Element::rectangle(0.0, 0.0, 100.0, 100.0));
        a.poll(0);
        b.poll(0);

        b.editor_mut().pointer_down(PointerEvent::at(50.0, 50.0));
        b.editor_mut().pointer_move(PointerEvent::at(80.0, 50.0));

        a.editor_mut().set_selection(&[id]);
        a.editor_mut().delete_selected();
        a.poll(100);
        a.poll(200);

        let report = b.poll(200);
        assert_eq!(report.merged.locked, 1);
        assert!(b.editor().scene().get(id).unwrap().is_active());
        b.editor_mut().pointer_up(PointerEvent::at(80.0, 50.0));

        // The held-back delete is merged against the committed drag.
        let report = b.poll(300);
        assert_eq!(report.merged.updated + report.merged.stale, 1);
        assert_eq!(b.synchronizer().deferred_len(), 0);
        b.poll(400);
        a.poll(400);
        assert_eq!(a.editor().scene().get(id), b.editor().scene().get(id));
    }

    #[test]
    fn test_peer_cursors() {
        let network = MemoryNetwork::new();
        let mut a = session(&network, "a").with_username("Ada");
        let mut b = session(&network, "b");
        a.send_cursor(Point::new(12.0, 34.0)).unwrap();
        b.poll(0);
        let cursor = &b.peer_cursors()["a"];
        assert_eq!(cursor.position, Point::new(12.0, 34.0));
        assert_eq!(cursor.username.as_deref(), Some("Ada"));
        b.remove_peer("a");
        assert!(b.peer_cursors().is_empty());
    }

    #[test]
    fn test_foreign_key_updates_are_rejected() {
        let network = MemoryNetwork::new();
        let mut a = session(&network, "a");
        let mut b = Session::new(
            Editor::default(),
            SceneCipher::new(&[1u8; KEY_LENGTH]),
            network.connect("b"),
        );
        a.editor_mut()
            .scene_mut()
            .insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        a.poll(0);
        let report = b.poll(0);
        assert_eq!(report.rejected, 1);
        assert!(b.editor().scene().is_empty());
    }
}
