//! Commands that act on the selection outside a pointer gesture.

use super::{Editor, GestureMode};
use crate::binding::{bound_connectors, clear_bindings_on_deletion, remap_bindings_on_duplication};
use crate::element::{Element, ElementId, ElementKind, GroupId, estimate_text_size};
use crate::selection::{selection_bounds, selection_group};
use crate::store::{ElementPatch, SceneData};
use crate::tools::ToolKind;
use kurbo::{Point, Size, Vec2};
use std::collections::HashMap;
use uuid::Uuid;

/// Screen margin kept around content when zooming to fit.
const CONTENT_PADDING: f64 = 30.0;

impl Editor {
    /// Undo the last committed change. Ignored mid-gesture.
    pub fn undo(&mut self) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        let current = self.interaction_snapshot();
        let Some(interaction) = self.history.undo(&mut self.scene, current) else {
            return false;
        };
        self.after_history_step(interaction);
        true
    }

    /// Redo the last undone change. Ignored mid-gesture.
    pub fn redo(&mut self) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        let current = self.interaction_snapshot();
        let Some(interaction) = self.history.redo(&mut self.scene, current) else {
            return false;
        };
        self.after_history_step(interaction);
        true
    }

    fn after_history_step(&mut self, interaction: crate::history::InteractionSnapshot) {
        self.apply_interaction(interaction);
        if let GestureMode::EditingConnectorPoints { connector, .. } = self.mode {
            if self.scene.get_active_by_id(connector).is_none() {
                self.mode = GestureMode::Idle;
            }
        }
        self.pending_commits += 1;
    }

    /// Tombstone the selection and detach connectors bound to it.
    pub fn delete_selected(&mut self) {
        if self.gesture.is_some() {
            self.cancel();
        }
        let ids: Vec<ElementId> = self.selected_elements().iter().map(|e| e.id()).collect();
        if ids.is_empty() {
            return;
        }
        let before = self.interaction_snapshot();
        let mut originals: Vec<Element> = ids.iter().filter_map(|id| self.scene.get(*id).cloned()).collect();
        for id in &ids {
            for connector in bound_connectors(self.scene.get_all(), *id) {
                if ids.contains(&connector) || originals.iter().any(|e| e.id() == connector) {
                    continue;
                }
                if let Some(c) = self.scene.get(connector) {
                    originals.push(c.clone());
                }
            }
        }
        for id in &ids {
            self.scene.mutate(*id, ElementPatch::new().deleted(true));
        }
        let detached = clear_bindings_on_deletion(&mut self.scene, &ids);
        log::debug!(
            "Deleted {} element(s), detached {} connector(s)",
            ids.len(),
            detached.len()
        );
        if let GestureMode::EditingConnectorPoints { connector, .. } = self.mode {
            if ids.contains(&connector) {
                self.mode = GestureMode::Idle;
            }
        }
        self.state.selected_ids.clear();
        self.state.editing_group_id = None;
        self.record(originals, before);
    }

    /// Duplicate the selection, offset by the configured distance, and
    /// select the copies.
    pub fn duplicate_selected(&mut self) {
        if self.gesture.is_some() {
            self.cancel();
        }
        let ids = self.state.selected_ids.clone();
        let offset = Vec2::new(self.config.duplicate_offset, self.config.duplicate_offset);
        let before = self.interaction_snapshot();
        let mapping = self.duplicate_elements(&ids, offset);
        if mapping.is_empty() {
            return;
        }
        let tombstones = mapping
            .iter()
            .filter_map(|(_, copy)| self.scene.get(*copy).map(|e| e.as_tombstone()))
            .collect();
        self.state.selected_ids = mapping.into_iter().map(|(_, copy)| copy).collect();
        self.record(tombstones, before);
    }

    /// Insert copies of `ids` on top, in z-order. Groups get fresh ids except
    /// the group being edited, and bindings between copied elements point at
    /// the copies. Returns `(original, copy)` pairs.
    pub(super) fn duplicate_elements(&mut self, ids: &[ElementId], offset: Vec2) -> Vec<(ElementId, ElementId)> {
        let editing_group = self.state.editing_group_id;
        let mut sources: Vec<&Element> = ids.iter().filter_map(|id| self.scene.get_active_by_id(*id)).collect();
        sources.sort_by_key(|e| self.scene.z_index(e.id()));

        let mut group_map: HashMap<GroupId, GroupId> = HashMap::new();
        let copies: Vec<(ElementId, Element)> = sources
            .into_iter()
            .map(|source| {
                let mut copy = source.duplicate();
                copy.x += offset.x;
                copy.y += offset.y;
                copy.group_ids = source
                    .group_ids
                    .iter()
                    .map(|g| {
                        if Some(*g) == editing_group {
                            *g
                        } else {
                            *group_map.entry(*g).or_insert_with(Uuid::new_v4)
                        }
                    })
                    .collect();
                (source.id(), copy)
            })
            .collect();

        let mapping: Vec<(ElementId, ElementId)> = copies
            .into_iter()
            .map(|(original, copy)| (original, self.scene.insert(copy)))
            .collect();
        let lookup: HashMap<ElementId, ElementId> = mapping.iter().copied().collect();
        remap_bindings_on_duplication(&mut self.scene, &lookup);
        mapping
    }

    /// Put the selection into a new group, nested inside the group being
    /// edited if any. Needs at least two elements.
    pub fn group_selected(&mut self) -> Option<GroupId> {
        let ids: Vec<ElementId> = self.selected_elements().iter().map(|e| e.id()).collect();
        if ids.len() < 2 {
            return None;
        }
        let before = self.interaction_snapshot();
        let group = Uuid::new_v4();
        let editing_group = self.state.editing_group_id;
        let mut originals = Vec::new();
        for id in &ids {
            let Some(element) = self.scene.get(*id) else {
                continue;
            };
            let mut group_ids = element.group_ids.clone();
            match editing_group.and_then(|g| group_ids.iter().position(|x| *x == g)) {
                Some(pos) => group_ids.insert(pos, group),
                None => group_ids.push(group),
            }
            originals.push(element.clone());
            self.scene.mutate(*id, ElementPatch::new().group_ids(group_ids));
        }
        log::debug!("Grouped {} element(s) as {}", ids.len(), group);
        self.record(originals, before);
        Some(group)
    }

    /// Dissolve the groups the selection was picked through.
    pub fn ungroup_selected(&mut self) {
        let before = self.interaction_snapshot();
        let editing_group = self.state.editing_group_id;
        let targets: Vec<(ElementId, GroupId)> = self
            .selected_elements()
            .iter()
            .filter_map(|e| selection_group(e, editing_group).map(|g| (e.id(), g)))
            .collect();
        if targets.is_empty() {
            return;
        }
        let mut originals = Vec::new();
        for (id, group) in &targets {
            let Some(element) = self.scene.get(*id) else {
                continue;
            };
            let group_ids = element.group_ids.iter().copied().filter(|g| g != group).collect();
            originals.push(element.clone());
            self.scene.mutate(*id, ElementPatch::new().group_ids(group_ids));
        }
        self.record(originals, before);
    }

    pub fn select_all(&mut self) {
        self.state.editing_group_id = None;
        self.state.selected_ids = self.scene.get_active().map(|e| e.id()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.state.selected_ids.clear();
        self.state.editing_group_id = None;
    }

    // Reordering is local. It is neither recorded nor broadcast.

    pub fn bring_to_front(&mut self) {
        let ids = self.state.selected_ids.clone();
        self.scene.bring_to_front(&ids);
    }

    pub fn send_to_back(&mut self) {
        let ids = self.state.selected_ids.clone();
        self.scene.send_to_back(&ids);
    }

    pub fn bring_forward(&mut self) {
        let ids = self.state.selected_ids.clone();
        self.scene.bring_forward(&ids);
    }

    pub fn send_backward(&mut self) {
        let ids = self.state.selected_ids.clone();
        self.scene.send_backward(&ids);
    }

    /// Switch tools. Drawing tools drop the selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.gesture.is_some() {
            self.cancel();
        }
        self.finish_connector_editing();
        if tool.is_drawing() {
            self.clear_selection();
        }
        log::debug!("Tool changed to {:?}", tool);
        self.state.active_tool = tool;
    }

    pub fn set_tool_locked(&mut self, locked: bool) {
        self.state.tool_locked = locked;
    }

    pub fn set_grid_enabled(&mut self, enabled: bool) {
        self.state.grid_enabled = enabled;
    }

    /// Zoom around a screen point, e.g. under the cursor on wheel input.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        self.state.camera.zoom_at(anchor, factor);
    }

    /// Frame every active element in a viewport of the given size. Returns
    /// `false` for an empty scene.
    pub fn zoom_to_content(&mut self, viewport: Size) -> bool {
        let Some(bounds) = selection_bounds(self.scene.get_active()) else {
            return false;
        };
        self.state.camera.zoom_to_fit(bounds, viewport, CONTENT_PADDING);
        true
    }

    /// Replace the content of a text element and re-estimate its box.
    pub fn set_text(&mut self, id: ElementId, text: &str) -> bool {
        let Some(element) = self.scene.get_active_by_id(id) else {
            return false;
        };
        let ElementKind::Text {
            text: current,
            font_size,
        } = &element.kind
        else {
            return false;
        };
        if current == text {
            return false;
        }
        let (width, height) = estimate_text_size(text, *font_size);
        let original = element.clone();
        let before = self.interaction_snapshot();
        self.scene
            .mutate(id, ElementPatch::new().text(text).size(width, height));
        self.record(vec![original], before);
        true
    }

    /// Replace the scene with loaded data. History and selection start over.
    pub fn load_scene(&mut self, data: SceneData) {
        if self.gesture.is_some() {
            self.cancel();
        }
        log::info!("Loading scene with {} element(s)", data.elements.len());
        self.mode = GestureMode::Idle;
        self.scene.replace_all(data.elements);
        self.history.clear();
        self.clear_selection();
        self.pending_commits = 0;
    }
}
