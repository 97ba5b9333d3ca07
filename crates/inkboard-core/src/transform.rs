//! Pure geometric transforms.
//!
//! Every function takes the element as it was when the gesture started and
//! the cumulative pointer delta, and returns the patch to apply. Nothing here
//! touches the store.

use crate::element::{Element, ElementId, ElementKind, anchor_world_points};
use crate::geometry::{normalize_angle, rotate_point, rotate_vec, snap_angle};
use crate::selection::{Corner, Edge, HandleKind, selection_bounds};
use crate::store::ElementPatch;
use kurbo::{Point, Rect, Vec2};

/// Smallest scale factor a group resize may reach.
pub const MIN_GROUP_SCALE: f64 = 0.01;

/// Modifiers that shape a resize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeConstraints {
    /// Scale both axes by one factor (corner handles only).
    pub keep_aspect: bool,
    /// Resize symmetrically about the centre.
    pub from_center: bool,
}

/// Which sides of the box a handle drags.
#[derive(Debug, Clone, Copy, Default)]
struct Sides {
    left: bool,
    right: bool,
    top: bool,
    bottom: bool,
}

fn sides(handle: HandleKind) -> Sides {
    let mut s = Sides::default();
    match handle {
        HandleKind::Corner(Corner::TopLeft) => (s.left, s.top) = (true, true),
        HandleKind::Corner(Corner::TopRight) => (s.right, s.top) = (true, true),
        HandleKind::Corner(Corner::BottomLeft) => (s.left, s.bottom) = (true, true),
        HandleKind::Corner(Corner::BottomRight) => (s.right, s.bottom) = (true, true),
        HandleKind::Edge(Edge::Top) => s.top = true,
        HandleKind::Edge(Edge::Right) => s.right = true,
        HandleKind::Edge(Edge::Bottom) => s.bottom = true,
        HandleKind::Edge(Edge::Left) => s.left = true,
        HandleKind::Rotate => {}
    }
    s
}

fn sign(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

/// Resize one element by dragging a corner or edge handle.
///
/// Dragging past the opposite side flips the element; the result is always
/// normalized, with point lists mirrored along the flipped axis.
pub fn resize(
    element: &Element,
    handle: HandleKind,
    pointer_delta: Vec2,
    constraints: ResizeConstraints,
) -> ElementPatch {
    if handle == HandleKind::Rotate {
        return ElementPatch::new();
    }
    let r = element.local_rect();
    let center = r.center();
    let d = rotate_vec(pointer_delta, -element.angle);
    let s = sides(handle);
    let (ow, oh) = (r.width(), r.height());
    let (mut x0, mut y0, mut x1, mut y1) = (r.x0, r.y0, r.x1, r.y1);

    if s.left {
        x0 += d.x;
        if constraints.from_center {
            x1 -= d.x;
        }
    }
    if s.right {
        x1 += d.x;
        if constraints.from_center {
            x0 -= d.x;
        }
    }
    if s.top {
        y0 += d.y;
        if constraints.from_center {
            y1 -= d.y;
        }
    }
    if s.bottom {
        y1 += d.y;
        if constraints.from_center {
            y0 -= d.y;
        }
    }

    let is_corner = matches!(handle, HandleKind::Corner(_));
    if constraints.keep_aspect && is_corner && ow > f64::EPSILON && oh > f64::EPSILON {
        let (w, h) = (x1 - x0, y1 - y0);
        let scale = (w.abs() / ow).max(h.abs() / oh);
        let nw = ow * scale * sign(w);
        let nh = oh * scale * sign(h);
        if constraints.from_center {
            (x0, x1) = (center.x - nw / 2.0, center.x + nw / 2.0);
            (y0, y1) = (center.y - nh / 2.0, center.y + nh / 2.0);
        } else {
            if s.left {
                x0 = x1 - nw;
            } else {
                x1 = x0 + nw;
            }
            if s.top {
                y0 = y1 - nh;
            } else {
                y1 = y0 + nh;
            }
        }
    }

    // Point that stays put in the unrotated frame.
    let pivot = if constraints.from_center {
        center
    } else {
        Point::new(
            if s.left {
                r.x1
            } else if s.right {
                r.x0
            } else {
                center.x
            },
            if s.top {
                r.y1
            } else if s.bottom {
                r.y0
            } else {
                center.y
            },
        )
    };

    let new_rect = Rect::new(x0, y0, x1, y1).abs();
    // Rotation happens about the centre, which moved; shift so the pivot
    // stays fixed in scene space.
    let shift = rotate_point(pivot, center, element.angle)
        - rotate_point(pivot, new_rect.center(), element.angle);

    match &element.kind {
        ElementKind::Connector { points, .. } | ElementKind::Freedraw { points } => {
            let map = |p: &Point| {
                let ax = element.x + p.x;
                let ay = element.y + p.y;
                let u = if ow > f64::EPSILON { (ax - r.x0) / ow } else { 0.0 };
                let v = if oh > f64::EPSILON { (ay - r.y0) / oh } else { 0.0 };
                Point::new(x0 + u * (x1 - x0), y0 + v * (y1 - y0)) + shift
            };
            let mapped: Vec<Point> = points.iter().map(map).collect();
            let Some(origin) = mapped.first().copied() else {
                return ElementPatch::new();
            };
            let rel = mapped.iter().map(|p| (*p - origin).to_point()).collect();
            ElementPatch::new().position(origin.x, origin.y).points(rel)
        }
        ElementKind::Text { font_size, .. } => {
            let mut patch = ElementPatch::new()
                .position(new_rect.x0 + shift.x, new_rect.y0 + shift.y)
                .size(new_rect.width(), new_rect.height());
            if oh > f64::EPSILON {
                patch = patch.font_size(font_size * new_rect.height() / oh);
            }
            patch
        }
        ElementKind::Rectangle | ElementKind::Ellipse | ElementKind::Diamond => ElementPatch::new()
            .position(new_rect.x0 + shift.x, new_rect.y0 + shift.y)
            .size(new_rect.width(), new_rect.height()),
    }
}

/// Scale a whole selection by one factor derived from its combined bounds,
/// anchored at the side opposite the handle.
pub fn resize_group(
    elements: &[Element],
    handle: HandleKind,
    pointer_delta: Vec2,
) -> Vec<(ElementId, ElementPatch)> {
    let Some(bounds) = selection_bounds(elements) else {
        return Vec::new();
    };
    if handle == HandleKind::Rotate {
        return Vec::new();
    }
    let s = sides(handle);
    let center = bounds.center();
    let anchor = Point::new(
        if s.left {
            bounds.x1
        } else if s.right {
            bounds.x0
        } else {
            center.x
        },
        if s.top {
            bounds.y1
        } else if s.bottom {
            bounds.y0
        } else {
            center.y
        },
    );
    let moving = Point::new(
        if s.left {
            bounds.x0
        } else if s.right {
            bounds.x1
        } else {
            center.x
        },
        if s.top {
            bounds.y0
        } else if s.bottom {
            bounds.y1
        } else {
            center.y
        },
    ) + pointer_delta;

    let (w, h) = (bounds.width(), bounds.height());
    let scale_x = ((s.left || s.right) && w > f64::EPSILON).then(|| (moving.x - anchor.x).abs() / w);
    let scale_y = ((s.top || s.bottom) && h > f64::EPSILON).then(|| (moving.y - anchor.y).abs() / h);
    let scale = match (scale_x, scale_y) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return Vec::new(),
    }
    .max(MIN_GROUP_SCALE);

    elements
        .iter()
        .map(|e| {
            let c = e.center();
            let nc = anchor + (c - anchor) * scale;
            let patch = match &e.kind {
                ElementKind::Connector { points, .. } | ElementKind::Freedraw { points } => {
                    let scaled: Vec<Point> =
                        points.iter().map(|p| Point::new(p.x * scale, p.y * scale)).collect();
                    let pc = crate::geometry::points_bounds(&scaled)
                        .map(|b| b.center())
                        .unwrap_or(Point::ZERO);
                    ElementPatch::new()
                        .position(nc.x - pc.x, nc.y - pc.y)
                        .points(scaled)
                }
                other => {
                    let (nw, nh) = (e.width.abs() * scale, e.height.abs() * scale);
                    let mut patch = ElementPatch::new()
                        .position(nc.x - nw / 2.0, nc.y - nh / 2.0)
                        .size(nw, nh);
                    if let ElementKind::Text { font_size, .. } = other {
                        patch = patch.font_size(font_size * scale);
                    }
                    patch
                }
            };
            (e.id(), patch)
        })
        .collect()
}

/// Rotate an element by `pointer_angle_delta` about `pivot`. With a snap
/// step the resulting angle lands on the nearest multiple of it.
pub fn rotate(
    element: &Element,
    pivot: Point,
    pointer_angle_delta: f64,
    snap_step: Option<f64>,
) -> ElementPatch {
    let mut angle = element.angle + pointer_angle_delta;
    if let Some(step) = snap_step {
        angle = snap_angle(angle, step);
    }
    let effective = angle - element.angle;
    let c = element.center();
    let nc = rotate_point(c, pivot, effective);
    ElementPatch::new()
        .position(element.x + nc.x - c.x, element.y + nc.y - c.y)
        .angle(normalize_angle(angle))
}

/// Move one point of a linear element. Point 0 stays the local origin.
pub fn drag_points(connector: &Element, point_index: usize, delta: Vec2) -> ElementPatch {
    let mut world = connector.world_points();
    let Some(point) = world.get_mut(point_index) else {
        return ElementPatch::new();
    };
    *point += delta;
    points_patch(connector.angle, &world)
}

/// Patch that sets a linear element's geometry from scene-space points.
pub fn points_patch(angle: f64, world: &[Point]) -> ElementPatch {
    let (origin, points) = anchor_world_points(angle, world);
    ElementPatch::new().position(origin.x, origin.y).points(points)
}

/// Translate an element.
pub fn translate(element: &Element, delta: Vec2) -> ElementPatch {
    ElementPatch::new().position(element.x + delta.x, element.y + delta.y)
}

/// Fold negative width/height into the position. `None` when already normal.
pub fn normalize_dimensions(element: &Element) -> Option<ElementPatch> {
    if element.is_linear() || (element.width >= 0.0 && element.height >= 0.0) {
        return None;
    }
    let r = Rect::new(
        element.x,
        element.y,
        element.x + element.width,
        element.y + element.height,
    )
    .abs();
    Some(
        ElementPatch::new()
            .position(r.x0, r.y0)
            .size(r.width(), r.height()),
    )
}

/// Shift-constrained size while drawing: squares for closed shapes, angle
/// snapped lines for connectors.
pub fn perfect_size(linear: bool, width: f64, height: f64, snap_step: f64) -> (f64, f64) {
    if linear {
        let length = width.hypot(height);
        let angle = snap_angle(height.atan2(width), snap_step);
        let (sin, cos) = angle.sin_cos();
        (length * cos, length * sin)
    } else {
        let size = width.abs().max(height.abs());
        (size * sign(width), size * sign(height))
    }
}

/// Whether an element is too small to have been meant.
pub fn is_invisibly_small(element: &Element, min_size: f64) -> bool {
    match element.points() {
        Some(points) => {
            let length: f64 = points.windows(2).map(|w| (w[1] - w[0]).hypot()).sum();
            points.len() < 2 || length < min_size
        }
        None => element.width.abs() < min_size || element.height.abs() < min_size,
    }
}

/// Angle of `point` around `pivot`.
pub fn pointer_angle(pivot: Point, point: Point) -> f64 {
    let v = point - pivot;
    v.y.atan2(v.x)
}
