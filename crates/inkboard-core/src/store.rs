//! Element store: the single authoritative, versioned element list.
//!
//! All writes go through [`Scene::mutate`], [`Scene::insert`],
//! [`Scene::replace_all`] or the explicit reorder operations, so version
//! bumping and invalidation stay in one place.

use crate::element::{Binding, Element, ElementId, ElementKind, ElementStyle, GroupId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised when reading persisted scene data.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Malformed scene data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unsupported scene type: {0}")]
    UnsupportedType(String),
}

/// Partial update applied by [`Scene::mutate`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub angle: Option<f64>,
    pub points: Option<Vec<Point>>,
    pub start_binding: Option<Option<Binding>>,
    pub end_binding: Option<Option<Binding>>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub is_deleted: Option<bool>,
    pub group_ids: Option<Vec<GroupId>>,
    pub style: Option<ElementStyle>,
}

impl ElementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn angle(mut self, angle: f64) -> Self {
        self.angle = Some(angle);
        self
    }

    pub fn points(mut self, points: Vec<Point>) -> Self {
        self.points = Some(points);
        self
    }

    pub fn start_binding(mut self, binding: Option<Binding>) -> Self {
        self.start_binding = Some(binding);
        self
    }

    pub fn end_binding(mut self, binding: Option<Binding>) -> Self {
        self.end_binding = Some(binding);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn font_size(mut self, font_size: f64) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn deleted(mut self, is_deleted: bool) -> Self {
        self.is_deleted = Some(is_deleted);
        self
    }

    pub fn group_ids(mut self, group_ids: Vec<GroupId>) -> Self {
        self.group_ids = Some(group_ids);
        self
    }

    pub fn style(mut self, style: ElementStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Patch that brings any element of the same kind back to `snapshot`.
    pub fn restore(snapshot: &Element) -> Self {
        let mut patch = Self::new()
            .position(snapshot.x, snapshot.y)
            .size(snapshot.width, snapshot.height)
            .angle(snapshot.angle)
            .deleted(snapshot.is_deleted)
            .group_ids(snapshot.group_ids.clone())
            .style(snapshot.style.clone());
        match &snapshot.kind {
            ElementKind::Connector {
                points,
                start_binding,
                end_binding,
            } => {
                patch.points = Some(points.clone());
                patch.start_binding = Some(*start_binding);
                patch.end_binding = Some(*end_binding);
            }
            ElementKind::Freedraw { points } => patch.points = Some(points.clone()),
            ElementKind::Text { text, font_size } => {
                patch.text = Some(text.clone());
                patch.font_size = Some(*font_size);
            }
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Diamond => {}
        }
        patch
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, element: &mut Element) {
        if let Some(x) = self.x {
            element.x = x;
        }
        if let Some(y) = self.y {
            element.y = y;
        }
        if let Some(width) = self.width {
            element.width = width;
        }
        if let Some(height) = self.height {
            element.height = height;
        }
        if let Some(angle) = self.angle {
            element.angle = angle;
        }
        if let Some(is_deleted) = self.is_deleted {
            element.is_deleted = is_deleted;
        }
        if let Some(group_ids) = self.group_ids {
            element.group_ids = group_ids;
        }
        if let Some(style) = self.style {
            element.style = style;
        }
        match &mut element.kind {
            ElementKind::Connector {
                points,
                start_binding,
                end_binding,
            } => {
                if let Some(new_points) = self.points {
                    *points = new_points;
                }
                if let Some(b) = self.start_binding {
                    *start_binding = b;
                }
                if let Some(b) = self.end_binding {
                    *end_binding = b;
                }
            }
            ElementKind::Freedraw { points } => {
                if let Some(new_points) = self.points {
                    *points = new_points;
                }
            }
            ElementKind::Text { text, font_size } => {
                if let Some(t) = self.text {
                    *text = t;
                }
                if let Some(f) = self.font_size {
                    *font_size = f;
                }
            }
            ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Diamond => {}
        }
        element.anchor_points();
    }
}

/// The element store.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Elements in z-order, bottom first. Tombstones included.
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
    revision: u64,
    invalidated: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from an element list.
    pub fn from_elements(elements: Vec<Element>) -> Self {
        let mut scene = Self::new();
        scene.replace_all(elements);
        scene
    }

    /// Non-deleted elements in z-order.
    pub fn get_active(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_active())
    }

    /// Every element, tombstones included.
    pub fn get_all(&self) -> &[Element] {
        &self.elements
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.index.get(&id).map(|&i| &self.elements[i])
    }

    /// Active element by id.
    pub fn get_active_by_id(&self, id: ElementId) -> Option<&Element> {
        self.get(id).filter(|e| e.is_active())
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Z position of an element.
    pub fn z_index(&self, id: ElementId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Replace the whole element list. Versions are kept as given.
    pub fn replace_all(&mut self, mut elements: Vec<Element>) {
        for element in &mut elements {
            element.anchor_points();
        }
        self.elements = elements;
        self.rebuild_index();
        self.invalidate();
    }

    /// Append a new element on top of the stack.
    pub fn insert(&mut self, mut element: Element) -> ElementId {
        element.anchor_points();
        let id = element.id;
        if let Some(&i) = self.index.get(&id) {
            log::warn!("Replacing element {} on insert", id);
            self.elements[i] = element;
        } else {
            self.index.insert(id, self.elements.len());
            self.elements.push(element);
        }
        self.invalidate();
        id
    }

    /// Apply a partial update, bump the version and regenerate the nonce.
    /// Returns `false` if the element does not exist.
    pub fn mutate(&mut self, id: ElementId, patch: ElementPatch) -> bool {
        let Some(&i) = self.index.get(&id) else {
            log::debug!("mutate: unknown element {}", id);
            return false;
        };
        let element = &mut self.elements[i];
        patch.apply(element);
        element.version += 1;
        element.version_nonce = rand::random();
        self.invalidate();
        true
    }

    /// Sum of all element versions. Grows with every mutation.
    pub fn scene_version(&self) -> u64 {
        self.elements.iter().map(|e| e.version).sum()
    }

    /// Invalidation counter, bumped on every write.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns whether anything changed since the last call.
    pub fn take_invalidated(&mut self) -> bool {
        std::mem::take(&mut self.invalidated)
    }

    /// Move elements to the top, keeping their relative order.
    pub fn bring_to_front(&mut self, ids: &[ElementId]) {
        let set: HashSet<ElementId> = ids.iter().copied().collect();
        let (moved, mut rest): (Vec<Element>, Vec<Element>) =
            self.elements.drain(..).partition(|e| set.contains(&e.id));
        rest.extend(moved);
        self.elements = rest;
        self.rebuild_index();
        self.invalidate();
    }

    /// Move elements to the bottom, keeping their relative order.
    pub fn send_to_back(&mut self, ids: &[ElementId]) {
        let set: HashSet<ElementId> = ids.iter().copied().collect();
        let (mut moved, rest): (Vec<Element>, Vec<Element>) =
            self.elements.drain(..).partition(|e| set.contains(&e.id));
        moved.extend(rest);
        self.elements = moved;
        self.rebuild_index();
        self.invalidate();
    }

    /// Move each element one step up, past the next active element.
    pub fn bring_forward(&mut self, ids: &[ElementId]) {
        let set: HashSet<ElementId> = ids.iter().copied().collect();
        for i in (0..self.elements.len()).rev() {
            if !set.contains(&self.elements[i].id) {
                continue;
            }
            let target = (i + 1..self.elements.len())
                .find(|&j| self.elements[j].is_active() && !set.contains(&self.elements[j].id));
            if let Some(j) = target {
                let element = self.elements.remove(i);
                self.elements.insert(j, element);
            }
        }
        self.rebuild_index();
        self.invalidate();
    }

    /// Move each element one step down, past the previous active element.
    pub fn send_backward(&mut self, ids: &[ElementId]) {
        let set: HashSet<ElementId> = ids.iter().copied().collect();
        for i in 0..self.elements.len() {
            if !set.contains(&self.elements[i].id) {
                continue;
            }
            let target = (0..i)
                .rev()
                .find(|&j| self.elements[j].is_active() && !set.contains(&self.elements[j].id));
            if let Some(j) = target {
                let element = self.elements.remove(i);
                self.elements.insert(j, element);
            }
        }
        self.rebuild_index();
        self.invalidate();
    }

    /// Topmost active element whose shape contains the point.
    pub fn element_at(&self, point: Point, tolerance: f64) -> Option<&Element> {
        self.elements
            .iter()
            .rev()
            .find(|e| e.is_active() && e.hit_test(point, tolerance))
    }

    /// Persistable form of the scene.
    pub fn to_data(&self) -> SceneData {
        SceneData::new(self.elements.clone())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
    }

    fn invalidate(&mut self) {
        self.revision += 1;
        self.invalidated = true;
    }
}

/// Scene type tag written into persisted data.
pub const SCENE_TYPE: &str = "inkboard";

/// Persisted scene format version.
pub const SCENE_FORMAT_VERSION: u32 = 1;

/// Serializable element list exchanged with the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneData {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl SceneData {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            kind: SCENE_TYPE.to_string(),
            version: SCENE_FORMAT_VERSION,
            elements,
        }
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let data: SceneData = serde_json::from_str(json)?;
        if data.kind != SCENE_TYPE {
            return Err(SceneError::UnsupportedType(data.kind));
        }
        Ok(data)
    }

    /// Parse scene JSON, falling back to an empty scene. The error is handed
    /// back so the caller can report it.
    pub fn from_json_or_empty(json: &str) -> (Self, Option<SceneError>) {
        match Self::from_json(json) {
            Ok(data) => (data, None),
            Err(e) => {
                log::warn!("Falling back to an empty scene: {}", e);
                (Self::new(Vec::new()), Some(e))
            }
        }
    }
}
