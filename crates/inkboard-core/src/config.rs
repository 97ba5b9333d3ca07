//! Editor tunables.

use serde::{Deserialize, Serialize};

/// Interaction and history settings. Lengths are in screen pixels unless
/// noted otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Pointer travel before a press becomes a drag.
    pub drag_threshold: f64,
    /// Distance around a shape within which connector endpoints bind.
    pub binding_margin: f64,
    /// Hit radius of transform handles.
    pub handle_hit_tolerance: f64,
    /// Slack when hit testing element outlines.
    pub hit_tolerance: f64,
    /// Created elements smaller than this (scene units) are discarded.
    pub min_element_size: f64,
    /// Rotation snap step in degrees.
    pub angle_snap_degrees: f64,
    pub history_limit: usize,
    /// Grid spacing in scene units.
    pub grid_size: f64,
    pub double_click_ms: u64,
    pub double_click_distance: f64,
    /// Offset applied to duplicated elements, in scene units.
    pub duplicate_offset: f64,
    pub sync: SyncConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 10.0,
            binding_margin: 32.0,
            handle_hit_tolerance: crate::selection::HANDLE_HIT_TOLERANCE,
            hit_tolerance: 5.0,
            min_element_size: 1.0,
            angle_snap_degrees: 15.0,
            history_limit: 50,
            grid_size: 20.0,
            double_click_ms: 500,
            double_click_distance: 5.0,
            duplicate_offset: 10.0,
            sync: SyncConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Rotation snap step in radians.
    pub fn angle_snap_step(&self) -> f64 {
        self.angle_snap_degrees.to_radians()
    }
}

/// Broadcast timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Quiet period after a local commit before the delta goes out.
    pub debounce_ms: u64,
    /// Period of the full-scene resync.
    pub full_sync_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            full_sync_interval_ms: 20_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert!((config.drag_threshold - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.sync.debounce_ms, 100);
        assert!((config.angle_snap_step() - 15f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{"bindingMargin": 8, "sync": {"debounceMs": 250}}"#).unwrap();
        assert!((config.binding_margin - 8.0).abs() < f64::EPSILON);
        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.full_sync_interval_ms, 20_000);
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(EditorConfig::from_json("{").is_err());
    }
}
