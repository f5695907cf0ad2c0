//! Runtime configuration.
//!
//! Every field has a default, so a host only writes what it wants to change:
//!
//! ```
//! use moa_engine::config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "gravity": [0.0, 0.0] }"#).unwrap();
//! assert_eq!(config.gravity, [0.0, 0.0]);
//! assert_eq!(config.canvas.width, 800.0);
//! ```

use std::path::Path;

use moa_ecs::broadcast::ThrottlePolicy;
use serde::{Deserialize, Serialize};

use crate::RuntimeError;

/// Default surface width in pixels.
pub const DEFAULT_CANVAS_WIDTH: f64 = 800.0;
/// Default surface height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;
/// Screen-space gravity: y grows downward, so positive y falls.
pub const DEFAULT_GRAVITY: [f64; 2] = [0.0, 1000.0];
/// How strongly a dragged body is pulled toward the pointer each frame.
pub const DEFAULT_DRAG_STIFFNESS: f64 = 0.2;

// ---------------------------------------------------------------------------
// RuntimeConfig
// ---------------------------------------------------------------------------

/// Configuration for one mounted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Seconds advanced per frame, for physics and systems alike.
    pub fixed_dt: f64,
    /// Gravity vector in pixels per second squared.
    pub gravity: [f64; 2],
    pub canvas: CanvasConfig,
    pub drag: DragConfig,
    /// When state broadcasts are actually emitted.
    pub broadcast: ThrottlePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            gravity: DEFAULT_GRAVITY,
            canvas: CanvasConfig::default(),
            drag: DragConfig::default(),
            broadcast: ThrottlePolicy::default(),
        }
    }
}

/// Drawing surface size in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

/// Pointer drag of dynamic bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    pub enabled: bool,
    /// Fraction of the anchor-to-pointer distance closed per frame, in (0, 1].
    pub stiffness: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stiffness: DEFAULT_DRAG_STIFFNESS,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject values the driver cannot run with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(RuntimeError::Config(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(RuntimeError::Config(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        let CanvasConfig { width, height } = self.canvas;
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(RuntimeError::Config(format!(
                "canvas size must be positive, got {width}x{height}"
            )));
        }
        if !(self.drag.stiffness > 0.0 && self.drag.stiffness <= 1.0) {
            return Err(RuntimeError::Config(format!(
                "drag stiffness must be within (0, 1], got {}",
                self.drag.stiffness
            )));
        }
        self.broadcast.validate().map_err(RuntimeError::Config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gravity, [0.0, 1000.0]);
        assert_eq!(config.broadcast, ThrottlePolicy::Interval { every_ticks: 60 });
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = RuntimeConfig::from_json_str(
            r#"{ "canvas": { "width": 1024 }, "broadcast": { "policy": "always" } }"#,
        )
        .unwrap();
        assert_eq!(config.canvas.width, 1024.0);
        assert_eq!(config.canvas.height, 600.0);
        assert_eq!(config.broadcast, ThrottlePolicy::Always);
        assert!(config.drag.enabled);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            r#"{ "fixed_dt": 0 }"#,
            r#"{ "fixed_dt": -0.1 }"#,
            r#"{ "canvas": { "width": 0 } }"#,
            r#"{ "drag": { "stiffness": 1.5 } }"#,
            r#"{ "broadcast": { "policy": "interval", "every_ticks": 0 } }"#,
        ];
        for text in bad {
            assert!(
                matches!(RuntimeConfig::from_json_str(text), Err(RuntimeError::Config(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            RuntimeConfig::from_json_str("{ not json"),
            Err(RuntimeError::ConfigParse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RuntimeConfig::from_path("/definitely/not/here/moa.json").unwrap_err();
        assert!(matches!(err, RuntimeError::ConfigIo { .. }));
        assert!(err.to_string().contains("moa.json"));
    }

    #[test]
    fn round_trips_through_json() {
        let config = RuntimeConfig {
            gravity: [0.0, 0.0],
            broadcast: ThrottlePolicy::OnChange { heartbeat_ticks: 30 },
            ..Default::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(RuntimeConfig::from_json_str(&text).unwrap(), config);
    }
}
