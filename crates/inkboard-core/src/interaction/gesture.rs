//! Pointer-down / move / up handling.

use super::Editor;
use crate::binding::{bind_or_unbind_connector, propagate_bound_movement, suggested_binding};
use crate::element::{Element, ElementId, ElementKind, Endpoint};
use crate::geometry::{snap_angle, snap_to_grid};
use crate::history::InteractionSnapshot;
use crate::input::{Modifiers, MouseButton, PointerEvent};
use crate::selection::{
    HandleKind, elements_in_rect, expand_to_groups, hit_test_handles, selection_bounds,
    selection_group, selection_handles,
};
use crate::store::ElementPatch;
use crate::tools::ToolKind;
use crate::transform::{self, ResizeConstraints};
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;

/// What the current pointer gesture is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureMode {
    #[default]
    Idle,
    SelectingBox,
    CreatingShape,
    Dragging,
    Resizing(HandleKind),
    Rotating,
    /// Sub-mode for editing a connector's points. `point` is the index being
    /// dragged, if any. Persists across gestures until finished.
    EditingConnectorPoints {
        connector: ElementId,
        point: Option<usize>,
    },
    PanningCanvas,
}

/// State captured once at pointer-down.
#[derive(Debug, Clone)]
pub struct GestureSnapshot {
    /// Scene position of the press.
    pub origin: Point,
    /// Screen position of the press, for the drag threshold.
    pub origin_screen: Point,
    pub modifiers: Modifiers,
    /// Pre-gesture state of every element the gesture may touch.
    pub originals: HashMap<ElementId, Element>,
    /// Elements created by this gesture.
    pub created: Vec<ElementId>,
    pub handle: Option<HandleKind>,
    /// Rotation pivot.
    pub pivot: Point,
    /// Whether the pointer has passed the drag threshold.
    pub moved: bool,
    pub duplicate_on_drag: bool,
    /// Already-selected element that was pressed. Without movement the
    /// selection narrows to it on release.
    pub pending_click: Option<ElementId>,
    pub selection_before: InteractionSnapshot,
    pub camera_offset: Vec2,
}

impl Editor {
    /// Handle a pointer press in screen coordinates.
    pub fn pointer_down(&mut self, event: PointerEvent) {
        if self.gesture.is_some() {
            log::debug!("Pointer down during an active gesture, cancelling it");
            self.cancel();
        }
        let point = self.state.camera.screen_to_world(event.position);
        let is_double =
            event.button == MouseButton::Left && self.clicks.register(event.time_ms, event.position);

        if event.button == MouseButton::Middle || self.state.active_tool == ToolKind::Pan {
            let snapshot = self.snapshot(point, &event);
            self.start(GestureMode::PanningCanvas, snapshot);
            return;
        }
        if event.button != MouseButton::Left {
            return;
        }

        if let GestureMode::EditingConnectorPoints { connector, .. } = self.mode {
            if self.scene.get_active_by_id(connector).is_some() {
                self.connector_edit_down(connector, point, &event);
                return;
            }
            self.mode = GestureMode::Idle;
        }

        if is_double && self.double_click_at(point) {
            return;
        }

        if self.state.active_tool != ToolKind::Selection {
            self.begin_creation(point, &event);
            return;
        }
        if let Some(handle) = self.handle_at(point) {
            self.begin_transform(handle, point, &event);
            return;
        }
        let tolerance = self.scaled(self.config.hit_tolerance);
        if let Some(hit) = self.scene.element_at(point, tolerance).map(|e| e.id()) {
            self.press_element(hit, point, &event);
            return;
        }
        let snapshot = self.snapshot(point, &event);
        if !event.modifiers.shift {
            self.state.selected_ids.clear();
            self.state.editing_group_id = None;
        }
        self.start(GestureMode::SelectingBox, snapshot);
    }

    /// Handle pointer movement in screen coordinates.
    pub fn pointer_move(&mut self, event: PointerEvent) {
        let Some(mut gesture) = self.gesture.take() else {
            return;
        };
        if !gesture.moved {
            if (event.position - gesture.origin_screen).hypot() < self.config.drag_threshold {
                self.gesture = Some(gesture);
                return;
            }
            gesture.moved = true;
            if gesture.duplicate_on_drag && self.mode == GestureMode::Dragging {
                self.duplicate_for_drag(&mut gesture);
            }
        }
        self.update_gesture(&gesture, &event);
        self.gesture = Some(gesture);
    }

    /// Handle a pointer release in screen coordinates.
    pub fn pointer_up(&mut self, event: PointerEvent) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        self.state.suggested_bindings.clear();
        let mode = self.mode;
        log::debug!("Gesture {:?} ended (moved: {})", mode, gesture.moved);
        match mode {
            GestureMode::Idle | GestureMode::PanningCanvas | GestureMode::SelectingBox => {
                self.mode = GestureMode::Idle;
            }
            GestureMode::Dragging => {
                self.mode = GestureMode::Idle;
                if gesture.moved {
                    self.commit_gesture(gesture, event.modifiers);
                } else if let Some(id) = gesture.pending_click {
                    self.state.selected_ids =
                        expand_to_groups(self.scene.get_all(), &[id], self.state.editing_group_id);
                }
            }
            GestureMode::Resizing(_) | GestureMode::Rotating => {
                self.mode = GestureMode::Idle;
                if gesture.moved {
                    self.commit_gesture(gesture, event.modifiers);
                }
            }
            GestureMode::CreatingShape => {
                self.mode = GestureMode::Idle;
                self.finish_creation(gesture, event.modifiers);
            }
            GestureMode::EditingConnectorPoints { connector, point } => {
                self.mode = GestureMode::EditingConnectorPoints {
                    connector,
                    point: None,
                };
                if gesture.moved {
                    self.commit_gesture(gesture, event.modifiers);
                } else if let Some(index) = point {
                    self.click_connector_point(connector, index, gesture, event.modifiers);
                }
            }
        }
    }

    /// Handle a double click. On a connector this enters point editing.
    pub fn double_click(&mut self, event: PointerEvent) -> bool {
        let point = self.state.camera.screen_to_world(event.position);
        self.double_click_at(point)
    }

    /// Enter point editing for a connector.
    pub fn enter_connector_editing(&mut self, connector: ElementId) -> bool {
        if !self
            .scene
            .get_active_by_id(connector)
            .is_some_and(|e| e.is_connector())
        {
            return false;
        }
        log::debug!("Editing points of {}", connector);
        self.state.selected_ids = vec![connector];
        self.mode = GestureMode::EditingConnectorPoints {
            connector,
            point: None,
        };
        true
    }

    /// Leave connector point editing.
    pub fn finish_connector_editing(&mut self) {
        if matches!(self.mode, GestureMode::EditingConnectorPoints { .. }) {
            if self.gesture.is_some() {
                self.cancel();
            }
            self.mode = GestureMode::Idle;
        }
    }

    /// Abort the active gesture, restoring every element it touched. Writes
    /// no history.
    pub fn cancel(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let mode = self.mode;
        log::debug!("Gesture {:?} cancelled", mode);
        self.mode = match mode {
            GestureMode::EditingConnectorPoints { connector, .. } => {
                GestureMode::EditingConnectorPoints {
                    connector,
                    point: None,
                }
            }
            _ => GestureMode::Idle,
        };
        if mode == GestureMode::PanningCanvas {
            self.state.camera.offset = gesture.camera_offset;
        }
        let mut changed = false;
        for (id, original) in &gesture.originals {
            let created = gesture.created.contains(id);
            let touched = self
                .scene
                .get(*id)
                .is_some_and(|now| now.version() != original.version());
            if created {
                changed |= self.scene.mutate(*id, ElementPatch::restore(&original.as_tombstone()));
            } else if touched {
                changed |= self.scene.mutate(*id, ElementPatch::restore(original));
            }
        }
        self.apply_interaction(gesture.selection_before);
        self.state.suggested_bindings.clear();
        if changed {
            self.pending_commits += 1;
        }
    }

    fn snapshot(&self, origin: Point, event: &PointerEvent) -> GestureSnapshot {
        GestureSnapshot {
            origin,
            origin_screen: event.position,
            modifiers: event.modifiers,
            originals: HashMap::new(),
            created: Vec::new(),
            handle: None,
            pivot: origin,
            moved: false,
            duplicate_on_drag: false,
            pending_click: None,
            selection_before: self.interaction_snapshot(),
            camera_offset: self.state.camera.offset,
        }
    }

    fn start(&mut self, mode: GestureMode, snapshot: GestureSnapshot) {
        log::debug!("Gesture {:?} started at {:?}", mode, snapshot.origin);
        self.mode = mode;
        self.gesture = Some(snapshot);
    }

    fn handle_at(&self, point: Point) -> Option<HandleKind> {
        let selected = self.selected_elements();
        if selected.is_empty() {
            return None;
        }
        let handles = selection_handles(&selected, self.state.camera.zoom);
        hit_test_handles(&handles, point, self.scaled(self.config.handle_hit_tolerance))
    }

    fn double_click_at(&mut self, point: Point) -> bool {
        let tolerance = self.scaled(self.config.hit_tolerance);
        let Some(hit) = self
            .scene
            .element_at(point, tolerance)
            .filter(|e| e.is_connector())
            .map(|e| e.id())
        else {
            return false;
        };
        self.enter_connector_editing(hit)
    }

    fn begin_transform(&mut self, handle: HandleKind, point: Point, event: &PointerEvent) {
        let mut snapshot = self.snapshot(point, event);
        let ids = self.state.selected_ids.clone();
        snapshot.originals = self.capture_originals(&ids);
        snapshot.handle = Some(handle);
        let selected = self.selected_elements();
        snapshot.pivot = match selected.as_slice() {
            [single] => single.center(),
            many => selection_bounds(many.iter().copied())
                .map(|b| b.center())
                .unwrap_or(point),
        };
        let mode = match handle {
            HandleKind::Rotate => GestureMode::Rotating,
            other => GestureMode::Resizing(other),
        };
        self.start(mode, snapshot);
    }

    fn press_element(&mut self, hit: ElementId, point: Point, event: &PointerEvent) {
        let Some(element) = self.scene.get(hit).cloned() else {
            return;
        };
        let mut snapshot = self.snapshot(point, event);
        if let Some(group) = self.state.editing_group_id {
            if !element.group_ids.contains(&group) {
                self.state.editing_group_id = None;
            }
        }
        let modifiers = event.modifiers;
        if modifiers.primary() {
            if let Some(group) = selection_group(&element, self.state.editing_group_id) {
                self.state.editing_group_id = Some(group);
            }
            self.state.selected_ids =
                expand_to_groups(self.scene.get_all(), &[hit], self.state.editing_group_id);
        } else {
            let group = expand_to_groups(self.scene.get_all(), &[hit], self.state.editing_group_id);
            if modifiers.shift {
                if self.is_selected(hit) {
                    self.state.selected_ids.retain(|id| !group.contains(id));
                } else {
                    for id in group {
                        if !self.state.selected_ids.contains(&id) {
                            self.state.selected_ids.push(id);
                        }
                    }
                }
            } else if self.is_selected(hit) {
                snapshot.pending_click = Some(hit);
            } else {
                self.state.selected_ids = group;
            }
        }
        snapshot.duplicate_on_drag = modifiers.alt;
        let ids = self.state.selected_ids.clone();
        snapshot.originals = self.capture_originals(&ids);
        self.start(GestureMode::Dragging, snapshot);
    }

    fn begin_creation(&mut self, point: Point, event: &PointerEvent) {
        let start = if self.state.grid_enabled {
            snap_to_grid(point, self.config.grid_size)
        } else {
            point
        };
        let Some(element) = self
            .state
            .active_tool
            .create_element(start, &self.state.current_style)
        else {
            return;
        };
        let mut snapshot = self.snapshot(start, event);
        log::debug!("Creating {} {}", element.kind.name(), element.id());
        snapshot.originals.insert(element.id(), element.clone());
        let id = self.scene.insert(element);
        snapshot.created.push(id);
        self.state.selected_ids = vec![id];
        self.state.editing_group_id = None;
        self.start(GestureMode::CreatingShape, snapshot);
    }

    fn connector_edit_down(&mut self, connector: ElementId, point: Point, event: &PointerEvent) {
        let Some(c) = self.scene.get(connector) else {
            return;
        };
        let tolerance = self.scaled(self.config.handle_hit_tolerance);
        let world = c.world_points();
        let hit = world
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (*p - point).hypot()))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        match hit {
            Some(index) => {
                let mut snapshot = self.snapshot(point, event);
                snapshot.originals = self.capture_originals(&[connector]);
                self.start(
                    GestureMode::EditingConnectorPoints {
                        connector,
                        point: Some(index),
                    },
                    snapshot,
                );
            }
            None => {
                let original = c.clone();
                let mut world = world;
                world.push(point);
                let before = self.interaction_snapshot();
                self.scene
                    .mutate(connector, transform::points_patch(original.angle, &world));
                self.rebind(connector, event.modifiers);
                self.record(vec![original], before);
            }
        }
    }

    /// A press and release on a connector point without dragging.
    fn click_connector_point(
        &mut self,
        connector: ElementId,
        index: usize,
        gesture: GestureSnapshot,
        modifiers: Modifiers,
    ) {
        let Some(c) = self.scene.get(connector) else {
            return;
        };
        let len = c.points().map_or(0, |p| p.len());
        if index + 1 == len {
            self.finish_connector_editing();
        } else if index == 0 && len >= 3 {
            let mut world = c.world_points();
            let first = world[0];
            world.push(first);
            let patch = transform::points_patch(c.angle, &world);
            self.scene.mutate(connector, patch);
            self.rebind(connector, modifiers);
            let changed = self.changed_originals(&gesture);
            self.record(changed, gesture.selection_before);
            self.finish_connector_editing();
        }
    }

    fn update_gesture(&mut self, gesture: &GestureSnapshot, event: &PointerEvent) {
        let point = self.state.camera.screen_to_world(event.position);
        let modifiers = event.modifiers;
        match self.mode {
            GestureMode::Idle => {}
            GestureMode::PanningCanvas => {
                self.state.camera.offset =
                    gesture.camera_offset + (event.position - gesture.origin_screen);
            }
            GestureMode::SelectingBox => {
                let rect = Rect::from_points(gesture.origin, point);
                let inside = elements_in_rect(self.scene.get_all(), rect);
                let mut ids = if modifiers.shift {
                    gesture.selection_before.selected_ids.clone()
                } else {
                    Vec::new()
                };
                for id in expand_to_groups(self.scene.get_all(), &inside, self.state.editing_group_id) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                self.state.selected_ids = ids;
            }
            GestureMode::Dragging => {
                let ids = self.state.selected_ids.clone();
                let mut delta = point - gesture.origin;
                if self.state.grid_enabled {
                    if let Some(anchor) = ids.iter().find_map(|id| gesture.originals.get(id)) {
                        let from = Point::new(anchor.x, anchor.y);
                        delta = snap_to_grid(from + delta, self.config.grid_size) - from;
                    }
                }
                for id in &ids {
                    if let Some(original) = gesture.originals.get(id) {
                        self.scene.mutate(*id, transform::translate(original, delta));
                    }
                }
                self.after_geometry_change(&ids, modifiers);
            }
            GestureMode::CreatingShape => self.update_creation(gesture, point, modifiers),
            GestureMode::Resizing(handle) => {
                let ids = self.state.selected_ids.clone();
                let delta = point - gesture.origin;
                let originals: Vec<Element> = ids
                    .iter()
                    .filter_map(|id| gesture.originals.get(id).cloned())
                    .collect();
                if let [single] = originals.as_slice() {
                    let constraints = ResizeConstraints {
                        keep_aspect: modifiers.shift
                            || matches!(single.kind, ElementKind::Text { .. }),
                        from_center: modifiers.alt,
                    };
                    let patch = transform::resize(single, handle, delta, constraints);
                    self.scene.mutate(single.id(), patch);
                } else {
                    for (id, patch) in transform::resize_group(&originals, handle, delta) {
                        self.scene.mutate(id, patch);
                    }
                }
                self.after_geometry_change(&ids, modifiers);
            }
            GestureMode::Rotating => {
                let ids = self.state.selected_ids.clone();
                let pivot = gesture.pivot;
                let delta = transform::pointer_angle(pivot, point)
                    - transform::pointer_angle(pivot, gesture.origin);
                let step = modifiers.shift.then(|| self.config.angle_snap_step());
                let originals: Vec<&Element> =
                    ids.iter().filter_map(|id| gesture.originals.get(id)).collect();
                let patches: Vec<(ElementId, ElementPatch)> = match originals.as_slice() {
                    [single] => vec![(single.id(), transform::rotate(single, pivot, delta, step))],
                    many => {
                        let delta = step.map_or(delta, |s| snap_angle(delta, s));
                        many.iter()
                            .map(|e| (e.id(), transform::rotate(e, pivot, delta, None)))
                            .collect()
                    }
                };
                for (id, patch) in patches {
                    self.scene.mutate(id, patch);
                }
                self.after_geometry_change(&ids, modifiers);
            }
            GestureMode::EditingConnectorPoints {
                connector,
                point: Some(index),
            } => {
                if let Some(original) = gesture.originals.get(&connector) {
                    let patch = transform::drag_points(original, index, point - gesture.origin);
                    self.scene.mutate(connector, patch);
                }
                self.refresh_suggestions(&[connector], modifiers);
            }
            GestureMode::EditingConnectorPoints { point: None, .. } => {}
        }
    }

    fn update_creation(&mut self, gesture: &GestureSnapshot, point: Point, modifiers: Modifiers) {
        let Some(id) = gesture.created.first().copied() else {
            return;
        };
        let Some(original) = gesture.originals.get(&id) else {
            return;
        };
        let origin = gesture.origin;
        let target = if self.state.grid_enabled {
            snap_to_grid(point, self.config.grid_size)
        } else {
            point
        };
        let step = self.config.angle_snap_step();
        let patch = match &original.kind {
            ElementKind::Connector { .. } => {
                let mut v = target - origin;
                if modifiers.shift {
                    let (w, h) = transform::perfect_size(true, v.x, v.y, step);
                    v = Vec2::new(w, h);
                }
                transform::points_patch(0.0, &[origin, origin + v])
            }
            ElementKind::Freedraw { .. } => {
                let mut world = self
                    .scene
                    .get(id)
                    .map(|e| e.world_points())
                    .unwrap_or_default();
                world.push(point);
                transform::points_patch(0.0, &world)
            }
            ElementKind::Text { .. } => ElementPatch::new(),
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Diamond => {
                let v = target - origin;
                let (w, h) = if modifiers.shift {
                    transform::perfect_size(false, v.x, v.y, step)
                } else {
                    (v.x, v.y)
                };
                if modifiers.alt {
                    ElementPatch::new()
                        .position(origin.x - w, origin.y - h)
                        .size(2.0 * w, 2.0 * h)
                } else {
                    ElementPatch::new().position(origin.x, origin.y).size(w, h)
                }
            }
        };
        if !patch.is_empty() {
            self.scene.mutate(id, patch);
        }
        self.refresh_suggestions(&[id], modifiers);
    }

    fn finish_creation(&mut self, gesture: GestureSnapshot, modifiers: Modifiers) {
        let Some(id) = gesture.created.first().copied() else {
            return;
        };
        let Some(element) = self.scene.get(id) else {
            return;
        };
        // Text boxes are sized by their content.
        let is_text = matches!(element.kind, ElementKind::Text { .. });
        if !is_text && transform::is_invisibly_small(element, self.config.min_element_size) {
            log::debug!("Discarding invisibly small {} {}", element.kind.name(), id);
            let tombstone = transform::normalize_dimensions(element).unwrap_or_default();
            self.scene.mutate(id, tombstone.deleted(true));
            self.state.selected_ids.retain(|s| *s != id);
            self.pending_commits += 1;
            return;
        }
        self.commit_gesture(gesture, modifiers);
        if !self.state.tool_locked {
            self.state.active_tool = ToolKind::Selection;
        }
    }

    /// Normalize, rebind and record a finished gesture.
    fn commit_gesture(&mut self, gesture: GestureSnapshot, modifiers: Modifiers) {
        let touched: Vec<ElementId> = gesture.originals.keys().copied().collect();
        for id in &touched {
            if let Some(patch) = self.scene.get(*id).and_then(transform::normalize_dimensions) {
                self.scene.mutate(*id, patch);
            }
        }
        let selected = self.state.selected_ids.clone();
        for id in &selected {
            if self.scene.get(*id).is_some_and(|e| e.is_connector()) {
                self.rebind(*id, modifiers);
            }
        }
        let changed = self.changed_originals(&gesture);
        self.record(changed, gesture.selection_before);
    }

    fn rebind(&mut self, connector: ElementId, modifiers: Modifiers) {
        bind_or_unbind_connector(
            &mut self.scene,
            connector,
            self.state.camera.zoom,
            self.config.binding_margin,
            !modifiers.primary(),
        );
    }

    /// Pre-gesture states of everything the gesture changed. Created
    /// elements are recorded as tombstones so undo removes them.
    fn changed_originals(&self, gesture: &GestureSnapshot) -> Vec<Element> {
        let mut changed: Vec<Element> = gesture
            .originals
            .iter()
            .filter_map(|(id, original)| {
                if gesture.created.contains(id) {
                    Some(original.as_tombstone())
                } else {
                    self.scene
                        .get(*id)
                        .filter(|now| now.version() != original.version())
                        .map(|_| original.clone())
                }
            })
            .collect();
        changed.sort_by_key(|e| self.scene.z_index(e.id()));
        changed
    }

    fn after_geometry_change(&mut self, ids: &[ElementId], modifiers: Modifiers) {
        for id in ids {
            if self.scene.get(*id).is_some_and(|e| e.is_bindable()) {
                propagate_bound_movement(&mut self.scene, *id);
            }
        }
        self.refresh_suggestions(ids, modifiers);
    }

    fn refresh_suggestions(&mut self, ids: &[ElementId], modifiers: Modifiers) {
        let mut suggestions = Vec::new();
        if !modifiers.primary() {
            for id in ids {
                let Some(c) = self.scene.get_active_by_id(*id).filter(|e| e.is_connector()) else {
                    continue;
                };
                for endpoint in Endpoint::BOTH {
                    let target = suggested_binding(
                        &self.scene,
                        c,
                        endpoint,
                        self.state.camera.zoom,
                        self.config.binding_margin,
                    );
                    if let Some(target) = target {
                        if !suggestions.contains(&target) {
                            suggestions.push(target);
                        }
                    }
                }
            }
        }
        self.state.suggested_bindings = suggestions;
    }

    /// Alt-drag: leave the originals in place and drag fresh copies.
    fn duplicate_for_drag(&mut self, gesture: &mut GestureSnapshot) {
        let ids = self.state.selected_ids.clone();
        let mapping = self.duplicate_elements(&ids, Vec2::ZERO);
        for (_, copy_id) in &mapping {
            if let Some(copy) = self.scene.get(*copy_id) {
                gesture.originals.insert(*copy_id, copy.clone());
            }
        }
        gesture.created.extend(mapping.iter().map(|(_, copy)| *copy));
        self.state.selected_ids = mapping.into_iter().map(|(_, copy)| copy).collect();
    }
}
