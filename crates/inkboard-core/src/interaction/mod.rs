//! Pointer interaction state machine.
//!
//! [`Editor`] owns the scene, the undo history and the ephemeral
//! application state, and turns pointer events into element edits. A gesture
//! captures a [`GestureSnapshot`] at pointer-down; every pointer-move
//! recomputes geometry from that snapshot and the cumulative delta, and
//! pointer-up commits one history entry.

mod actions;
mod gesture;

pub use gesture::{GestureMode, GestureSnapshot};

use crate::binding::bound_connectors;
use crate::camera::Camera;
use crate::config::EditorConfig;
use crate::element::{Element, ElementId, ElementStyle, GroupId};
use crate::history::{History, HistoryEntry, InteractionSnapshot};
use crate::input::ClickTracker;
use crate::store::Scene;
use crate::tools::ToolKind;
use std::collections::{HashMap, HashSet};

/// Ephemeral, unpersisted application state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Selected element ids, in selection order.
    pub selected_ids: Vec<ElementId>,
    /// Group entered for sub-selection.
    pub editing_group_id: Option<GroupId>,
    pub camera: Camera,
    pub active_tool: ToolKind,
    /// Keep the drawing tool active after creating an element.
    pub tool_locked: bool,
    pub grid_enabled: bool,
    /// Style given to newly drawn elements.
    pub current_style: ElementStyle,
    /// Shapes a dragged connector endpoint would bind to on release.
    pub suggested_bindings: Vec<ElementId>,
}

/// The editing core: scene, history and the gesture state machine.
#[derive(Debug, Clone)]
pub struct Editor {
    scene: Scene,
    history: History,
    pub state: AppState,
    config: EditorConfig,
    mode: GestureMode,
    gesture: Option<GestureSnapshot>,
    clicks: ClickTracker,
    pending_commits: usize,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_scene(Scene::new(), config)
    }

    pub fn with_scene(scene: Scene, config: EditorConfig) -> Self {
        Self {
            scene,
            history: History::new(config.history_limit),
            state: AppState::default(),
            clicks: ClickTracker::new(config.double_click_ms, config.double_click_distance),
            config,
            mode: GestureMode::Idle,
            gesture: None,
            pending_commits: 0,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Direct store access for remote merges. Writes made here skip history.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    /// Snapshot of the gesture in progress, if any.
    pub fn gesture(&self) -> Option<&GestureSnapshot> {
        self.gesture.as_ref()
    }

    pub fn selected_ids(&self) -> &[ElementId] {
        &self.state.selected_ids
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.state.selected_ids.contains(&id)
    }

    /// Active selected elements, in selection order.
    pub fn selected_elements(&self) -> Vec<&Element> {
        self.state
            .selected_ids
            .iter()
            .filter_map(|id| self.scene.get_active_by_id(*id))
            .collect()
    }

    /// Replace the selection.
    pub fn set_selection(&mut self, ids: &[ElementId]) {
        self.state.selected_ids = ids
            .iter()
            .copied()
            .filter(|id| self.scene.get_active_by_id(*id).is_some())
            .collect();
    }

    pub fn interaction_snapshot(&self) -> InteractionSnapshot {
        InteractionSnapshot {
            selected_ids: self.state.selected_ids.clone(),
            editing_group_id: self.state.editing_group_id,
        }
    }

    fn apply_interaction(&mut self, snapshot: InteractionSnapshot) {
        self.set_selection(&snapshot.selected_ids);
        self.state.editing_group_id = snapshot.editing_group_id;
    }

    /// Elements the active gesture is editing. Remote merges leave them alone.
    pub fn locked_element_ids(&self) -> HashSet<ElementId> {
        let mut locked: HashSet<ElementId> = self
            .gesture
            .iter()
            .flat_map(|g| g.originals.keys().chain(g.created.iter()))
            .copied()
            .collect();
        if let GestureMode::EditingConnectorPoints { connector, .. } = self.mode {
            locked.insert(connector);
        }
        locked
    }

    /// Number of committed local changes since the last call.
    pub fn take_commits(&mut self) -> usize {
        std::mem::take(&mut self.pending_commits)
    }

    /// Pre-gesture copies of `ids` and every connector bound to them.
    fn capture_originals(&self, ids: &[ElementId]) -> HashMap<ElementId, Element> {
        let mut originals = HashMap::new();
        for id in ids {
            let Some(element) = self.scene.get_active_by_id(*id) else {
                continue;
            };
            originals.insert(*id, element.clone());
            for connector in bound_connectors(self.scene.get_all(), *id) {
                if let Some(c) = self.scene.get(connector) {
                    originals.entry(connector).or_insert_with(|| c.clone());
                }
            }
        }
        originals
    }

    /// Push a history entry and count one commit.
    fn record(&mut self, elements: Vec<Element>, interaction: InteractionSnapshot) {
        if elements.is_empty() {
            return;
        }
        log::debug!("Recording history entry for {} element(s)", elements.len());
        self.history.push(HistoryEntry {
            elements,
            interaction,
        });
        self.pending_commits += 1;
    }

    /// Scene length of a screen-space distance at the current zoom.
    fn scaled(&self, screen_len: f64) -> f64 {
        self.state.camera.screen_to_world_len(screen_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerEvent;

    #[test]
    fn test_new_editor_is_idle() {
        let editor = Editor::default();
        assert_eq!(editor.mode(), GestureMode::Idle);
        assert!(editor.gesture().is_none());
        assert!(editor.selected_ids().is_empty());
        assert!(editor.locked_element_ids().is_empty());
    }

    #[test]
    fn test_set_selection_drops_unknown_and_deleted() {
        let mut editor = Editor::default();
        let a = editor.scene_mut().insert(Element::rectangle(0.0, 0.0, 10.0, 10.0));
        editor.set_selection(&[a, ElementId::new_v4()]);
        assert_eq!(editor.selected_ids(), &[a]);
    }

    #[test]
    fn test_capture_includes_bound_connectors() {
        let mut editor = Editor::default();
        let rect = editor.scene_mut().insert(Element::rectangle(0.0, 0.0, 100.0, 100.0));
        let c = editor
            .scene_mut()
            .insert(Element::connector(kurbo::Point::new(110.0, 50.0), kurbo::Point::new(300.0, 50.0)));
        crate::binding::establish_binding(editor.scene_mut(), c, crate::element::Endpoint::Start, rect);
        let originals = editor.capture_originals(&[rect]);
        assert!(originals.contains_key(&rect));
        assert!(originals.contains_key(&c));
    }

    #[test]
    fn test_locked_ids_during_gesture() {
        let mut editor = Editor::default();
        let rect = editor.scene_mut().insert(Element::rectangle(0.0, 0.0, 100.0, 100.0));
        editor.pointer_down(PointerEvent::at(50.0, 50.0));
        assert!(editor.locked_element_ids().contains(&rect));
        editor.pointer_up(PointerEvent::at(50.0, 50.0));
        assert!(editor.locked_element_ids().is_empty());
    }
}
