//! Tool system for the whiteboard.

use crate::element::{DEFAULT_FONT_SIZE, Element, ElementStyle};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    #[default]
    Selection,
    Pan,
    Rectangle,
    Ellipse,
    Diamond,
    Text,
    Connector,
    Freedraw,
}

impl ToolKind {
    /// Whether pressing on empty canvas with this tool creates an element.
    pub fn is_drawing(self) -> bool {
        !matches!(self, ToolKind::Selection | ToolKind::Pan)
    }

    /// Zero-size element this tool starts drawing at `start`, styled with
    /// `style`. `None` for non-drawing tools.
    pub fn create_element(self, start: Point, style: &ElementStyle) -> Option<Element> {
        let mut element = match self {
            ToolKind::Selection | ToolKind::Pan => return None,
            ToolKind::Rectangle => Element::rectangle(start.x, start.y, 0.0, 0.0),
            ToolKind::Ellipse => Element::ellipse(start.x, start.y, 0.0, 0.0),
            ToolKind::Diamond => Element::diamond(start.x, start.y, 0.0, 0.0),
            ToolKind::Text => Element::text(start.x, start.y, "", DEFAULT_FONT_SIZE),
            ToolKind::Connector => Element::connector(start, start),
            ToolKind::Freedraw => Element::freedraw(&[start]),
        };
        let seed = element.style.seed;
        element.style = ElementStyle {
            seed,
            ..style.clone()
        };
        Some(element)
    }
}
