//! Transform handles and group-aware selection helpers.

use crate::element::{Element, ElementId, GroupId};
use crate::geometry::{common_bounds, rotate_point};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 24.0;
/// Distance from the top edge to the rotation handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;

/// Type of transform handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// Corner handle, resizes both axes.
    Corner(Corner),
    /// Edge midpoint handle, resizes one axis.
    Edge(Edge),
    /// Rotation handle above the top edge.
    Rotate,
}

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// A handle with its position and type.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    /// Position in scene coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a scene point hits this handle.
    /// `tolerance` should be adjusted for camera zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Handles of a single element, rotated with it.
pub fn element_handles(element: &Element, zoom: f64) -> Vec<Handle> {
    let rect = element.local_rect();
    let with_edges = !element.is_connector() && !matches!(element.kind, crate::element::ElementKind::Text { .. });
    box_handles(rect, element.angle, zoom, with_edges)
}

/// Handles for the current selection. Multiple elements share one unrotated
/// box with corner and rotation handles.
pub fn selection_handles(elements: &[&Element], zoom: f64) -> Vec<Handle> {
    match elements {
        [] => Vec::new(),
        [single] => element_handles(single, zoom),
        many => match common_bounds(many.iter().map(|e| e.aabb())) {
            Some(rect) => box_handles(rect, 0.0, zoom, false),
            None => Vec::new(),
        },
    }
}

fn box_handles(rect: Rect, angle: f64, zoom: f64, with_edges: bool) -> Vec<Handle> {
    let center = rect.center();
    let at = |x: f64, y: f64| rotate_point(Point::new(x, y), center, angle);
    let mut handles = vec![
        Handle::new(at(rect.x0, rect.y0), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(at(rect.x1, rect.y0), HandleKind::Corner(Corner::TopRight)),
        Handle::new(at(rect.x0, rect.y1), HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(at(rect.x1, rect.y1), HandleKind::Corner(Corner::BottomRight)),
    ];
    if with_edges {
        handles.extend([
            Handle::new(at(center.x, rect.y0), HandleKind::Edge(Edge::Top)),
            Handle::new(at(rect.x1, center.y), HandleKind::Edge(Edge::Right)),
            Handle::new(at(center.x, rect.y1), HandleKind::Edge(Edge::Bottom)),
            Handle::new(at(rect.x0, center.y), HandleKind::Edge(Edge::Left)),
        ]);
    }
    let offset = ROTATE_HANDLE_OFFSET / zoom.max(f64::EPSILON);
    handles.push(Handle::new(at(center.x, rect.y0 - offset), HandleKind::Rotate));
    handles
}

/// Closest handle within `tolerance` of the point.
pub fn hit_test_handles(handles: &[Handle], point: Point, tolerance: f64) -> Option<HandleKind> {
    handles
        .iter()
        .filter(|h| h.hit_test(point, tolerance))
        .min_by(|a, b| {
            let da = (point - a.position).hypot2();
            let db = (point - b.position).hypot2();
            da.total_cmp(&db)
        })
        .map(|h| h.kind)
}

/// Group a click on `element` selects, given the group being edited.
///
/// Outside group editing this is the outermost group. Inside a group it is
/// the group nested directly within it, or none when the element is a direct
/// member.
pub fn selection_group(element: &Element, editing_group: Option<GroupId>) -> Option<GroupId> {
    let editing_pos = editing_group.and_then(|g| element.group_ids.iter().position(|x| *x == g));
    match editing_pos {
        Some(0) => None,
        Some(k) => Some(element.group_ids[k - 1]),
        None => element.outermost_group(),
    }
}

/// Expand a selection so that it covers whole groups.
pub fn expand_to_groups(
    elements: &[Element],
    ids: &[ElementId],
    editing_group: Option<GroupId>,
) -> Vec<ElementId> {
    let selected: HashSet<ElementId> = ids.iter().copied().collect();
    let groups: HashSet<GroupId> = elements
        .iter()
        .filter(|e| selected.contains(&e.id()))
        .filter_map(|e| selection_group(e, editing_group))
        .collect();
    elements
        .iter()
        .filter(|e| e.is_active())
        .filter(|e| selected.contains(&e.id()) || e.group_ids.iter().any(|g| groups.contains(g)))
        .map(|e| e.id())
        .collect()
}

/// Axis-aligned bounds of a set of elements.
pub fn selection_bounds<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Option<Rect> {
    common_bounds(elements.into_iter().map(|e| e.aabb()))
}

/// Active elements whose bounds lie fully inside `rect`.
pub fn elements_in_rect(elements: &[Element], rect: Rect) -> Vec<ElementId> {
    elements
        .iter()
        .filter(|e| e.is_active())
        .filter(|e| {
            let b = e.aabb();
            rect.contains(Point::new(b.x0, b.y0)) && rect.contains(Point::new(b.x1, b.y1))
        })
        .map(|e| e.id())
        .collect()
}
