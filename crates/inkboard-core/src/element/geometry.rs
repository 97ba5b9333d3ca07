//! Per-kind geometry: bounds, world-space points, hit testing and outline
//! distance.

use super::{Element, ElementKind, Endpoint};
use crate::geometry::{
    distance_to_box, distance_to_diamond, distance_to_ellipse, distance_to_polyline,
    points_bounds, rotate_point,
};
use kurbo::{Point, Rect, Vec2};

/// Convert scene-space points of a rotated linear element back into its
/// `(origin, relative points)` form, keeping point 0 at the origin.
///
/// The element rotates about the centre of its unrotated bounds, so the
/// origin has to be solved for rather than copied from the first point.
pub fn anchor_world_points(angle: f64, world: &[Point]) -> (Point, Vec<Point>) {
    if world.is_empty() {
        return (Point::ZERO, vec![Point::ZERO]);
    }
    let unrotated: Vec<Point> = world
        .iter()
        .map(|p| rotate_point(*p, Point::ZERO, -angle))
        .collect();
    let center = points_bounds(&unrotated)
        .map(|r| r.center())
        .unwrap_or(Point::ZERO);
    let shift = rotate_point(center, Point::ZERO, angle) - center;
    let origin = unrotated[0] + shift;
    let points = unrotated.iter().map(|p| (*p - unrotated[0]).to_point()).collect();
    (origin, points)
}

impl Element {
    /// Unrotated bounds in scene space.
    pub fn local_rect(&self) -> Rect {
        match self.points().and_then(points_bounds) {
            Some(bounds) => bounds + Vec2::new(self.x, self.y),
            None => Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs(),
        }
    }

    /// Rotation pivot: centre of the unrotated bounds.
    pub fn center(&self) -> Point {
        self.local_rect().center()
    }

    /// Half extents of the unrotated bounds.
    pub fn half_extents(&self) -> Vec2 {
        let r = self.local_rect();
        Vec2::new(r.width() / 2.0, r.height() / 2.0)
    }

    /// Scene point expressed relative to the element centre in its unrotated frame.
    pub fn to_local(&self, point: Point) -> Vec2 {
        let center = self.center();
        rotate_point(point, center, -self.angle) - center
    }

    /// Inverse of [`Element::to_local`].
    pub fn from_local(&self, local: Vec2) -> Point {
        let center = self.center();
        rotate_point(center + local, center, self.angle)
    }

    /// Scene-space points of a linear element, rotation applied.
    pub fn world_points(&self) -> Vec<Point> {
        let Some(points) = self.points() else {
            return Vec::new();
        };
        let center = self.center();
        points
            .iter()
            .map(|p| rotate_point(Point::new(self.x + p.x, self.y + p.y), center, self.angle))
            .collect()
    }

    /// Scene-space position of a connector endpoint.
    pub fn endpoint_world(&self, endpoint: Endpoint) -> Option<Point> {
        let world = self.world_points();
        let idx = endpoint.index(world.len());
        world.get(idx).copied()
    }

    /// Corners of the rotated bounds in scene space.
    pub fn corners(&self) -> [Point; 4] {
        let r = self.local_rect();
        let c = r.center();
        [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ]
        .map(|p| rotate_point(p, c, self.angle))
    }

    /// Axis-aligned bounds of the rotated element.
    pub fn aabb(&self) -> Rect {
        let pts = if self.is_linear() {
            self.world_points()
        } else {
            self.corners().to_vec()
        };
        points_bounds(&pts).unwrap_or_else(|| Rect::from_origin_size((self.x, self.y), (0.0, 0.0)))
    }

    /// Whether the element's shape (not its bounding box) contains the point.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match &self.kind {
            ElementKind::Connector { .. } | ElementKind::Freedraw { .. } => {
                let reach = tolerance + self.style.stroke_width / 2.0;
                distance_to_polyline(point, &self.world_points()) <= reach
            }
            _ => self.distance_to_outline(point) <= tolerance,
        }
    }

    /// Distance from a scene point to the filled outline of a closed shape.
    /// Zero when the point is inside. Linear elements measure to the stroke.
    pub fn distance_to_outline(&self, point: Point) -> f64 {
        match &self.kind {
            ElementKind::Connector { .. } | ElementKind::Freedraw { .. } => {
                distance_to_polyline(point, &self.world_points())
            }
            _ => self.local_distance_to_outline(self.to_local(point)),
        }
    }

    /// Same as [`Element::distance_to_outline`] for a point already in the
    /// element's local frame.
    pub fn local_distance_to_outline(&self, local: Vec2) -> f64 {
        let half = self.half_extents();
        match &self.kind {
            ElementKind::Rectangle | ElementKind::Text { .. } => {
                distance_to_box(local, half.x, half.y)
            }
            ElementKind::Ellipse => distance_to_ellipse(local, half.x, half.y),
            ElementKind::Diamond => distance_to_diamond(local, half.x, half.y),
            ElementKind::Connector { .. } | ElementKind::Freedraw { .. } => {
                distance_to_polyline(self.from_local(local), &self.world_points())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rectangle_hit_test_uses_shape() {
        let rect = Element::rectangle(0.0, 0.0, 100.0, 50.0);
        assert!(rect.hit_test(Point::new(50.0, 25.0), 0.0));
        assert!(rect.hit_test(Point::new(103.0, 25.0), 5.0));
        assert!(!rect.hit_test(Point::new(110.0, 25.0), 5.0));
    }

    #[test]
    fn test_ellipse_corner_is_not_hit() {
        let ellipse = Element::ellipse(0.0, 0.0, 100.0, 100.0);
        assert!(ellipse.hit_test(Point::new(50.0, 50.0), 0.0));
        // Inside the bounding box but outside the ellipse.
        assert!(!ellipse.hit_test(Point::new(2.0, 2.0), 1.0));
    }

    #[test]
    fn test_diamond_hit_test() {
        let diamond = Element::diamond(0.0, 0.0, 100.0, 100.0);
        assert!(diamond.hit_test(Point::new(50.0, 10.0), 0.0));
        assert!(!diamond.hit_test(Point::new(5.0, 5.0), 1.0));
    }

    #[test]
    fn test_rotated_rectangle_hit_test() {
        let mut rect = Element::rectangle(0.0, 40.0, 100.0, 20.0);
        rect.angle = FRAC_PI_2;
        // After a quarter turn the rectangle spans x 40..60, y 0..100.
        assert!(rect.hit_test(Point::new(50.0, 5.0), 0.0));
        assert!(!rect.hit_test(Point::new(5.0, 50.0), 1.0));
    }

    #[test]
    fn test_connector_hit_test() {
        let c = Element::connector(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(c.hit_test(Point::new(50.0, 3.0), 5.0));
        assert!(!c.hit_test(Point::new(50.0, 20.0), 5.0));
    }

    #[test]
    fn test_world_points_rotated_half_turn() {
        let mut c = Element::connector(Point::new(220.0, 250.0), Point::new(380.0, 250.0));
        c.angle = PI;
        let world = c.world_points();
        assert!((world[0].x - 380.0).abs() < 1e-9);
        assert!((world[1].x - 220.0).abs() < 1e-9);
        assert!((world[0].y - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_world_points_roundtrips_rotation() {
        let mut c = Element::connector_through(&[
            Point::new(10.0, 10.0),
            Point::new(60.0, 30.0),
            Point::new(90.0, -20.0),
        ]);
        c.angle = 0.7;
        let world = c.world_points();
        let (origin, points) = anchor_world_points(c.angle, &world);
        assert!((origin.x - c.x).abs() < 1e-9);
        assert!((origin.y - c.y).abs() < 1e-9);
        assert_eq!(points[0], Point::ZERO);
        for (a, b) in points.iter().zip(c.points().unwrap()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_aabb_of_rotated_square() {
        let mut rect = Element::rectangle(0.0, 0.0, 10.0, 10.0);
        rect.angle = PI / 4.0;
        let aabb = rect.aabb();
        let half_diag = 50f64.sqrt();
        assert!((aabb.x0 - (5.0 - half_diag)).abs() < 1e-9);
        assert!((aabb.x1 - (5.0 + half_diag)).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_outline_rectangle() {
        let rect = Element::rectangle(0.0, 0.0, 200.0, 500.0);
        assert!((rect.distance_to_outline(Point::new(220.0, 250.0)) - 20.0).abs() < 1e-9);
        assert_eq!(rect.distance_to_outline(Point::new(100.0, 100.0)), 0.0);
    }
}
