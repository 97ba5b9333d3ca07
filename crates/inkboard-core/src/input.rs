//! Pointer events and modifier state handed to the editor.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn primary(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub position: Point,
    #[serde(default)]
    pub button: MouseButton,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Milliseconds on the caller's monotonic clock.
    #[serde(default)]
    pub time_ms: u64,
}

impl PointerEvent {
    /// Left-button event without modifiers.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
            time_ms: 0,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_time(mut self, time_ms: u64) -> Self {
        self.time_ms = time_ms;
        self
    }
}

/// Double-click detection on pointer-down events.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    window_ms: u64,
    max_distance: f64,
    last_click: Option<(u64, Point)>,
}

impl ClickTracker {
    pub fn new(window_ms: u64, max_distance: f64) -> Self {
        Self {
            window_ms,
            max_distance,
            last_click: None,
        }
    }

    /// Record a left-button press. Returns whether it completes a double click.
    pub fn register(&mut self, time_ms: u64, position: Point) -> bool {
        if let Some((last_time, last_pos)) = self.last_click {
            let elapsed = time_ms.saturating_sub(last_time);
            let distance = (position - last_pos).hypot();
            if elapsed < self.window_ms && distance < self.max_distance {
                // Reset so a triple click is not a second double click.
                self.last_click = None;
                return true;
            }
        }
        self.last_click = Some((time_ms, position));
        false
    }

    pub fn reset(&mut self) {
        self.last_click = None;
    }
}
