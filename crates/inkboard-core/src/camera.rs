//! Viewport over the scene.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// Maps scene coordinates to screen pixels: `screen = scene * zoom + offset`.
///
/// Pointer events arrive in screen space and are converted before any hit
/// testing, so thresholds given in pixels shrink in scene units as the user
/// zooms in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Screen position of the scene origin.
    pub offset: Vec2,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    fn scene_to_screen(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.scene_to_screen().inverse() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.scene_to_screen() * world_point
    }

    /// A length in screen pixels expressed in scene units.
    pub fn screen_to_world_len(&self, len: f64) -> f64 {
        len / self.zoom.max(f64::EPSILON)
    }

    /// Scale by `factor` around a screen point that stays put.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let pinned = self.screen_to_world(anchor);
        self.zoom = zoom;
        self.offset = anchor.to_vec2() - pinned.to_vec2() * zoom;
    }

    /// Center `bounds` in a viewport of the given size, never zooming past
    /// 100%.
    pub fn zoom_to_fit(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        let room = Size::new(
            (viewport.width - 2.0 * padding).max(1.0),
            (viewport.height - 2.0 * padding).max(1.0),
        );
        self.zoom = if bounds.width() > 0.0 && bounds.height() > 0.0 {
            (room.width / bounds.width())
                .min(room.height / bounds.height())
                .clamp(MIN_ZOOM, 1.0)
        } else {
            1.0
        };
        let middle = Point::new(viewport.width / 2.0, viewport.height / 2.0);
        self.offset = middle.to_vec2() - bounds.center().to_vec2() * self.zoom;
    }
}
