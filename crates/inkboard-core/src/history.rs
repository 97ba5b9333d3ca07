//! Undo/redo of committed gestures.
//!
//! An entry stores the pre-gesture state of only the elements a gesture
//! touched. Restores go through [`Scene::mutate`], so an undo is an ordinary
//! versioned change and gets broadcast like any other edit.

use crate::element::{Element, ElementId, GroupId};
use crate::store::{ElementPatch, Scene};

/// Default maximum number of undo entries to keep.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Selection state restored alongside the elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionSnapshot {
    pub selected_ids: Vec<ElementId>,
    pub editing_group_id: Option<GroupId>,
}

/// One undoable step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Element states to restore, sparse.
    pub elements: Vec<Element>,
    pub interaction: InteractionSnapshot,
}

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    limit: usize,
    suspended: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            suspended: false,
        }
    }

    /// Record an entry. Clears redo. Ignored while recording is suspended or
    /// when the entry is empty.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.suspended || entry.elements.is_empty() {
            return;
        }
        self.undo_stack.push(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the last entry. Returns the selection to restore, or `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self, scene: &mut Scene, current: InteractionSnapshot) -> Option<InteractionSnapshot> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(capture(scene, &entry, current));
        restore(scene, &entry);
        Some(entry.interaction)
    }

    /// Redo the last undone entry.
    pub fn redo(&mut self, scene: &mut Scene, current: InteractionSnapshot) -> Option<InteractionSnapshot> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(capture(scene, &entry, current));
        restore(scene, &entry);
        Some(entry.interaction)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Stop recording, e.g. while remote changes are merged.
    pub fn suspend_recording(&mut self) {
        self.suspended = true;
    }

    pub fn resume_recording(&mut self) {
        self.suspended = false;
    }

    pub fn is_recording(&self) -> bool {
        !self.suspended
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Current state of the elements an entry covers.
fn capture(scene: &Scene, entry: &HistoryEntry, interaction: InteractionSnapshot) -> HistoryEntry {
    HistoryEntry {
        elements: entry
            .elements
            .iter()
            .filter_map(|e| scene.get(e.id()).cloned())
            .collect(),
        interaction,
    }
}

fn restore(scene: &mut Scene, entry: &HistoryEntry) {
    for snapshot in &entry.elements {
        if !scene.mutate(snapshot.id(), ElementPatch::restore(snapshot)) {
            log::debug!("Skipping restore of missing element {}", snapshot.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(elements: Vec<Element>) -> HistoryEntry {
        HistoryEntry {
            elements,
            interaction: InteractionSnapshot::default(),
        }
    }

    #[test]
    fn test_undo_redo_roundtrip() {
        let mut scene = Scene::new();
        let id = scene.insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let mut history = History::default();

        let before = scene.get(id).unwrap().clone();
        scene.mutate(id, ElementPatch::new().position(50.0, 60.0));
        history.push(entry(vec![before]));

        assert!(history.undo(&mut scene, InteractionSnapshot::default()).is_some());
        let e = scene.get(id).unwrap();
        assert!((e.x - 0.0).abs() < f64::EPSILON);
        assert!(history.can_redo());

        assert!(history.redo(&mut scene, InteractionSnapshot::default()).is_some());
        let e = scene.get(id).unwrap();
        assert!((e.x - 50.0).abs() < f64::EPSILON);
        assert!((e.y - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_undo_bumps_version() {
        let mut scene = Scene::new();
        let id = scene.insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let mut history = History::default();
        history.push(entry(vec![scene.get(id).unwrap().clone()]));
        scene.mutate(id, ElementPatch::new().position(5.0, 5.0));
        let version = scene.get(id).unwrap().version();
        history.undo(&mut scene, InteractionSnapshot::default());
        assert!(scene.get(id).unwrap().version() > version);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut scene = Scene::new();
        let id = scene.insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let mut history = History::default();
        history.push(entry(vec![scene.get(id).unwrap().clone()]));
        history.undo(&mut scene, InteractionSnapshot::default());
        assert!(history.can_redo());
        history.push(entry(vec![scene.get(id).unwrap().clone()]));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(3);
        let rect = Element::rectangle(0.0, 0.0, 1.0, 1.0);
        for _ in 0..5 {
            history.push(entry(vec![rect.clone()]));
        }
        assert_eq!(history.undo_stack.len(), 3);
    }

    #[test]
    fn test_suspended_push_is_ignored() {
        let mut history = History::default();
        history.suspend_recording();
        history.push(entry(vec![Element::rectangle(0.0, 0.0, 1.0, 1.0)]));
        assert!(!history.can_undo());
        history.resume_recording();
        history.push(entry(vec![Element::rectangle(0.0, 0.0, 1.0, 1.0)]));
        assert!(history.can_undo());
    }

    #[test]
    fn test_missing_elements_are_skipped() {
        let mut scene = Scene::new();
        let kept = scene.insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let gone = Element::rectangle(5.0, 5.0, 10.0, 10.0);
        let mut history = History::default();
        history.push(entry(vec![gone, scene.get(kept).unwrap().clone()]));
        scene.mutate(kept, ElementPatch::new().position(9.0, 9.0));

        history.undo(&mut scene, InteractionSnapshot::default());
        assert!((scene.get(kept).unwrap().x - 0.0).abs() < f64::EPSILON);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_interaction_snapshot_restored() {
        let mut scene = Scene::new();
        let id = scene.insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        let mut history = History::default();
        history.push(HistoryEntry {
            elements: vec![scene.get(id).unwrap().clone()],
            interaction: InteractionSnapshot {
                selected_ids: vec![id],
                editing_group_id: None,
            },
        });
        let after = InteractionSnapshot::default();
        let restored = history.undo(&mut scene, after.clone()).unwrap();
        assert_eq!(restored.selected_ids, vec![id]);
        assert_eq!(history.redo(&mut scene, restored).unwrap(), after);
    }

    #[test]
    fn test_clear() {
        let mut history = History::default();
        history.push(entry(vec![Element::rectangle(0.0, 0.0, 1.0, 1.0)]));
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
