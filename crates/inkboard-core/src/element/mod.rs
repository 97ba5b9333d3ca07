//! Scene elements.
//!
//! Every element shares one set of common fields (identity, geometry,
//! versioning, tombstone, groups, style). Per-kind data lives in the closed
//! [`ElementKind`] enum so the engines can match exhaustively on it.

mod geometry;

pub use geometry::anchor_world_points;

use kurbo::{Point, Vec2};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Unique identifier for groups.
pub type GroupId = Uuid;

/// Default font size for new text elements.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Which end of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub const BOTH: [Endpoint; 2] = [Endpoint::Start, Endpoint::End];

    /// Index of this endpoint in a point list of length `len`.
    pub fn index(self, len: usize) -> usize {
        match self {
            Endpoint::Start => 0,
            Endpoint::End => len.saturating_sub(1),
        }
    }

    /// Index of the point next to this endpoint, used to pick the side of a
    /// bound shape the endpoint should sit on.
    pub fn adjacent_index(self, len: usize) -> usize {
        match self {
            Endpoint::Start => 1.min(len.saturating_sub(1)),
            Endpoint::End => len.saturating_sub(2),
        }
    }

    /// Endpoint sitting at a given point index, if any.
    pub fn at_index(index: usize, len: usize) -> Option<Endpoint> {
        if index == 0 {
            Some(Endpoint::Start)
        } else if len > 0 && index == len - 1 {
            Some(Endpoint::End)
        } else {
            None
        }
    }
}

/// Attachment of a connector endpoint to a bindable element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub element_id: ElementId,
    /// Projection of the endpoint onto the bound element's diagonal, in
    /// `[-1, 1]` with `0` at the centre.
    pub focus: f64,
    /// Distance kept between the endpoint and the bound element's outline.
    pub gap: f64,
}

/// Kind-specific element data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    Text {
        text: String,
        #[serde(rename = "fontSize")]
        font_size: f64,
    },
    Connector {
        /// Relative polyline, point 0 is always the origin.
        #[serde(deserialize_with = "deserialize_points")]
        points: Vec<Point>,
        #[serde(rename = "startBinding", default)]
        start_binding: Option<Binding>,
        #[serde(rename = "endBinding", default)]
        end_binding: Option<Binding>,
    },
    Freedraw {
        #[serde(deserialize_with = "deserialize_points")]
        points: Vec<Point>,
    },
}

/// Linear elements always carry at least their origin point.
fn non_empty(points: Vec<Point>) -> Vec<Point> {
    if points.is_empty() {
        vec![Point::ZERO]
    } else {
        points
    }
}

fn deserialize_points<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
    Vec::<Point>::deserialize(deserializer).map(non_empty)
}

impl ElementKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Diamond => "diamond",
            ElementKind::Text { .. } => "text",
            ElementKind::Connector { .. } => "connector",
            ElementKind::Freedraw { .. } => "freedraw",
        }
    }
}

/// Visual properties carried with an element. Interpreted by the renderer only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Seed for hand-drawn stroke jitter.
    #[serde(default)]
    pub seed: u32,
}

fn default_stroke_color() -> String {
    "#1e1e1e".to_string()
}

fn default_background_color() -> String {
    "transparent".to_string()
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            stroke_color: default_stroke_color(),
            background_color: default_background_color(),
            stroke_width: default_stroke_width(),
            opacity: default_opacity(),
            seed: rand::random(),
        }
    }
}

/// Rough box of a single line of text. The renderer replaces it once the
/// text is measured.
pub fn estimate_text_size(text: &str, font_size: f64) -> (f64, f64) {
    let chars = text.chars().count().max(1) as f64;
    (chars * font_size * 0.6, font_size * 1.25)
}

/// A scene element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub(crate) id: ElementId,
    #[serde(flatten)]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    pub(crate) version: u64,
    pub(crate) version_nonce: u32,
    #[serde(default)]
    pub(crate) is_deleted: bool,
    /// Group memberships, outermost last.
    #[serde(default)]
    pub group_ids: Vec<GroupId>,
    #[serde(default)]
    pub style: ElementStyle,
}

impl Element {
    /// Create a new element at version 1.
    pub fn new(kind: ElementKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        let mut element = Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            angle: 0.0,
            version: 1,
            version_nonce: rand::random(),
            is_deleted: false,
            group_ids: Vec::new(),
            style: ElementStyle::default(),
        };
        element.sync_linear_extent();
        element
    }

    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Rectangle, x, y, width, height)
    }

    pub fn ellipse(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Ellipse, x, y, width, height)
    }

    pub fn diamond(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Diamond, x, y, width, height)
    }

    /// Create a text element. Its box is estimated from the character count
    /// until the renderer measures it.
    pub fn text(x: f64, y: f64, text: impl Into<String>, font_size: f64) -> Self {
        let text = text.into();
        let (width, height) = estimate_text_size(&text, font_size);
        Self::new(ElementKind::Text { text, font_size }, x, y, width, height)
    }

    /// Create a straight two-point connector between two scene points.
    pub fn connector(start: Point, end: Point) -> Self {
        Self::connector_through(&[start, end])
    }

    /// Create an unrotated connector through the given scene points.
    pub fn connector_through(world: &[Point]) -> Self {
        let (origin, points) = anchor_world_points(0.0, world);
        Self::new(
            ElementKind::Connector {
                points,
                start_binding: None,
                end_binding: None,
            },
            origin.x,
            origin.y,
            0.0,
            0.0,
        )
    }

    /// Create an unrotated free-draw stroke through the given scene points.
    pub fn freedraw(world: &[Point]) -> Self {
        let (origin, points) = anchor_world_points(0.0, world);
        Self::new(ElementKind::Freedraw { points }, origin.x, origin.y, 0.0, 0.0)
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn version_nonce(&self) -> u32 {
        self.version_nonce
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Whether the element is visible (not tombstoned).
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    pub fn is_connector(&self) -> bool {
        matches!(self.kind, ElementKind::Connector { .. })
    }

    /// Whether the geometry is a point list (connectors and free-draw).
    pub fn is_linear(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Connector { .. } | ElementKind::Freedraw { .. }
        )
    }

    /// Whether connector endpoints may attach to this element.
    pub fn is_bindable(&self) -> bool {
        match self.kind {
            ElementKind::Rectangle
            | ElementKind::Ellipse
            | ElementKind::Diamond
            | ElementKind::Text { .. } => true,
            ElementKind::Connector { .. } | ElementKind::Freedraw { .. } => false,
        }
    }

    /// Relative points for linear elements.
    pub fn points(&self) -> Option<&[Point]> {
        match &self.kind {
            ElementKind::Connector { points, .. } | ElementKind::Freedraw { points } => {
                Some(points)
            }
            _ => None,
        }
    }

    /// Binding at one end of a connector.
    pub fn binding(&self, endpoint: Endpoint) -> Option<&Binding> {
        match &self.kind {
            ElementKind::Connector {
                start_binding,
                end_binding,
                ..
            } => match endpoint {
                Endpoint::Start => start_binding.as_ref(),
                Endpoint::End => end_binding.as_ref(),
            },
            _ => None,
        }
    }

    /// Whether either end of this connector is bound to `target`.
    pub fn is_bound_to(&self, target: ElementId) -> bool {
        Endpoint::BOTH
            .iter()
            .any(|e| self.binding(*e).is_some_and(|b| b.element_id == target))
    }

    /// Outermost group this element belongs to.
    pub fn outermost_group(&self) -> Option<GroupId> {
        self.group_ids.last().copied()
    }

    /// Copy with a fresh identity at version 1.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.version = 1;
        copy.version_nonce = rand::random();
        copy.style.seed = rand::random();
        copy
    }

    /// Copy marked as deleted, used as the "before" state of a newly created
    /// element in history.
    pub(crate) fn as_tombstone(&self) -> Self {
        let mut copy = self.clone();
        copy.is_deleted = true;
        copy
    }

    /// Bring a linear element's points into canonical form: never empty and
    /// point 0 at the local origin. The scene-space geometry is unchanged.
    pub(crate) fn anchor_points(&mut self) {
        let shift = match &mut self.kind {
            ElementKind::Connector { points, .. } | ElementKind::Freedraw { points } => {
                if points.is_empty() {
                    points.push(Point::ZERO);
                }
                let first = points.first().map_or(Vec2::ZERO, |p| p.to_vec2());
                if first != Vec2::ZERO {
                    for p in points.iter_mut() {
                        *p -= first;
                    }
                }
                first
            }
            ElementKind::Rectangle
            | ElementKind::Ellipse
            | ElementKind::Diamond
            | ElementKind::Text { .. } => return,
        };
        self.x += shift.x;
        self.y += shift.y;
        self.sync_linear_extent();
    }

    /// Re-derive width/height of linear elements from their points.
    pub(crate) fn sync_linear_extent(&mut self) {
        if let Some(bounds) = self.points().and_then(crate::geometry::points_bounds) {
            self.width = bounds.width();
            self.height = bounds.height();
        }
    }
}
