//! Scene-space geometry helpers shared by the element model and the engines.

use kurbo::{Point, Rect, Vec2};
use std::f64::consts::TAU;

/// Rotate `point` around `center` by `angle` radians (clockwise in screen space).
pub fn rotate_point(point: Point, center: Point, angle: f64) -> Point {
    if angle == 0.0 {
        return point;
    }
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(
        center.x + dx * cos - dy * sin,
        center.y + dx * sin + dy * cos,
    )
}

/// Rotate a vector by `angle` radians.
pub fn rotate_vec(v: Vec2, angle: f64) -> Vec2 {
    rotate_point(v.to_point(), Point::ZERO, angle).to_vec2()
}

/// Normalize an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid can return TAU itself for tiny negative inputs
    if a >= TAU { 0.0 } else { a }
}

/// Snap an angle to the nearest multiple of `step` radians.
pub fn snap_angle(angle: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return angle;
    }
    (angle / step).round() * step
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if grid_size <= 0.0 {
        return point;
    }
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

/// Distance from point `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let ap = p - a;
    let len_sq = ab.hypot2();
    if len_sq < f64::EPSILON {
        return ap.hypot();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn distance_to_polyline(p: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (p - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| distance_to_segment(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Axis-aligned bounds of a point set, or `None` for an empty set.
pub fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let mut rect = Rect::from_points(*first, *first);
    for p in &points[1..] {
        rect = rect.union_pt(*p);
    }
    Some(rect)
}

/// Union of a collection of rectangles.
pub fn common_bounds(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// Distance from a point (relative to the centre) to a filled ellipse with
/// semi-axes `a` and `b`. Zero inside.
pub fn distance_to_ellipse(p: Vec2, a: f64, b: f64) -> f64 {
    let (px, py) = (p.x.abs(), p.y.abs());
    if a <= f64::EPSILON || b <= f64::EPSILON {
        // Degenerate ellipse collapses to a segment on the longer axis.
        let seg = if a > b {
            distance_to_segment(Point::new(px, py), Point::new(-a, 0.0), Point::new(a, 0.0))
        } else {
            distance_to_segment(Point::new(px, py), Point::new(0.0, -b), Point::new(0.0, b))
        };
        return seg;
    }
    if (px / a).powi(2) + (py / b).powi(2) <= 1.0 {
        return 0.0;
    }

    // Iterative closest point on the ellipse boundary (first quadrant).
    let mut tx = std::f64::consts::FRAC_1_SQRT_2;
    let mut ty = std::f64::consts::FRAC_1_SQRT_2;
    for _ in 0..8 {
        let x = a * tx;
        let y = b * ty;
        let ex = (a * a - b * b) * tx.powi(3) / a;
        let ey = (b * b - a * a) * ty.powi(3) / b;
        let (rx, ry) = (x - ex, y - ey);
        let (qx, qy) = (px - ex, py - ey);
        let r = rx.hypot(ry);
        let q = qx.hypot(qy).max(f64::EPSILON);
        tx = ((qx * r / q + ex) / a).clamp(0.0, 1.0);
        ty = ((qy * r / q + ey) / b).clamp(0.0, 1.0);
        let t = tx.hypot(ty).max(f64::EPSILON);
        tx /= t;
        ty /= t;
    }
    (px - a * tx).hypot(py - b * ty)
}

/// Distance from a point (relative to the centre) to a filled diamond whose
/// vertices sit at the edge midpoints of a `2hw` x `2hh` box. Zero inside.
pub fn distance_to_diamond(p: Vec2, hw: f64, hh: f64) -> f64 {
    let (px, py) = (p.x.abs(), p.y.abs());
    if hw <= f64::EPSILON || hh <= f64::EPSILON {
        return distance_to_segment(
            Point::new(px, py),
            Point::new(-hw, -hh),
            Point::new(hw, hh),
        );
    }
    if px / hw + py / hh <= 1.0 {
        return 0.0;
    }
    distance_to_segment(Point::new(px, py), Point::new(hw, 0.0), Point::new(0.0, hh))
}

/// Distance from a point (relative to the centre) to a filled axis-aligned
/// box of half extents `hw` x `hh`. Zero inside.
pub fn distance_to_box(p: Vec2, hw: f64, hh: f64) -> f64 {
    let dx = (p.x.abs() - hw).max(0.0);
    let dy = (p.y.abs() - hh).max(0.0);
    dx.hypot(dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rotate_point_quarter_turn() {
        let p = rotate_point(Point::new(10.0, 0.0), Point::ZERO, FRAC_PI_2);
        assert!(p.x.abs() < 1e-10);
        assert!((p.y - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_rotate_point_about_center() {
        let p = rotate_point(Point::new(220.0, 250.0), Point::new(300.0, 250.0), PI);
        assert!((p.x - 380.0).abs() < 1e-9);
        assert!((p.y - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-FRAC_PI_2) - 1.5 * PI).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!(normalize_angle(TAU).abs() < 1e-12);
    }

    #[test]
    fn test_snap_angle() {
        let step = 15f64.to_radians();
        let snapped = snap_angle(50f64.to_radians(), step);
        assert!((snapped - 45f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_snap_to_grid() {
        let p = snap_to_grid(Point::new(31.0, 9.0), 20.0);
        assert_eq!(p, Point::new(40.0, 0.0));
    }

    #[test]
    fn test_distance_to_segment() {
        let d = distance_to_segment(Point::new(5.0, 5.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
        let d = distance_to_segment(Point::new(-3.0, 4.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_to_box() {
        assert_eq!(distance_to_box(Vec2::new(5.0, 5.0), 10.0, 10.0), 0.0);
        assert!((distance_to_box(Vec2::new(20.0, 0.0), 10.0, 10.0) - 10.0).abs() < 1e-12);
        assert!((distance_to_box(Vec2::new(13.0, 14.0), 10.0, 10.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_to_ellipse_on_axis() {
        let d = distance_to_ellipse(Vec2::new(150.0, 0.0), 100.0, 50.0);
        assert!((d - 50.0).abs() < 1e-6);
        let d = distance_to_ellipse(Vec2::new(0.0, -80.0), 100.0, 50.0);
        assert!((d - 30.0).abs() < 1e-6);
        assert_eq!(distance_to_ellipse(Vec2::new(10.0, 10.0), 100.0, 50.0), 0.0);
    }

    #[test]
    fn test_distance_to_circle_matches_radius() {
        let d = distance_to_ellipse(Vec2::new(30.0, 40.0), 10.0, 10.0);
        assert!((d - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_to_diamond() {
        assert_eq!(distance_to_diamond(Vec2::new(0.0, 0.0), 50.0, 50.0), 0.0);
        let d = distance_to_diamond(Vec2::new(60.0, 0.0), 50.0, 50.0);
        assert!((d - 10.0).abs() < 1e-9);
        // Facing the middle of the edge (50,0)-(0,50).
        let d = distance_to_diamond(Vec2::new(35.0, 35.0), 50.0, 50.0);
        assert!((d - 20.0 / 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_points_bounds() {
        let b = points_bounds(&[Point::new(1.0, 5.0), Point::new(-2.0, 3.0)]).unwrap();
        assert_eq!(b, Rect::new(-2.0, 3.0, 1.0, 5.0));
        assert!(points_bounds(&[]).is_none());
    }
}
