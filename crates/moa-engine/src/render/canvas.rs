//! The 2D drawing surface abstraction.

use rapier2d::na::{Isometry2, Point2};

/// Font family used for all text entities.
pub const MONOSPACE: &str = "monospace";

/// A font request: pixel size and family.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub size_px: f64,
    pub family: String,
}

impl Font {
    pub fn monospace(size_px: f64) -> Self {
        Self {
            size_px,
            family: MONOSPACE.to_owned(),
        }
    }

    /// CSS shorthand, e.g. `16px monospace`.
    pub fn css(&self) -> String {
        format!("{}px {}", self.size_px, self.family)
    }
}

// ---------------------------------------------------------------------------
// Canvas
// ---------------------------------------------------------------------------

/// Immediate-mode 2D drawing surface with a save/restore transform stack.
///
/// Coordinates are pixels, origin top-left, y down. `translate` and `rotate`
/// compose onto the current transform; fill calls are in the current local
/// frame.
pub trait Canvas {
    fn width(&self) -> f64;
    fn height(&self) -> f64;

    /// Wipe the whole surface.
    fn clear(&mut self);
    /// Push the current transform and fill style.
    fn save(&mut self);
    /// Pop back to the last saved transform and fill style.
    fn restore(&mut self);
    fn translate(&mut self, x: f64, y: f64);
    fn rotate(&mut self, angle: f64);
    fn set_fill_style(&mut self, color: &str);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64);
    /// Text centered on `(x, y)` both horizontally and vertically.
    fn fill_text(&mut self, text: &str, x: f64, y: f64, font: &Font);
}

// ---------------------------------------------------------------------------
// CanvasState
// ---------------------------------------------------------------------------

/// Transform stack and fill style shared by canvas implementations.
#[derive(Debug, Clone)]
pub struct CanvasState {
    transform: Isometry2<f64>,
    fill: String,
    stack: Vec<(Isometry2<f64>, String)>,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            transform: Isometry2::identity(),
            fill: "#000000".to_owned(),
            stack: Vec::new(),
        }
    }
}

impl CanvasState {
    pub fn save(&mut self) {
        self.stack.push((self.transform, self.fill.clone()));
    }

    /// Unbalanced restores are ignored, as on an HTML canvas.
    pub fn restore(&mut self) {
        if let Some((transform, fill)) = self.stack.pop() {
            self.transform = transform;
            self.fill = fill;
        }
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.transform *= Isometry2::translation(x, y);
    }

    pub fn rotate(&mut self, angle: f64) {
        self.transform *= Isometry2::rotation(angle);
    }

    pub fn set_fill(&mut self, color: &str) {
        color.clone_into(&mut self.fill);
    }

    pub fn fill(&self) -> &str {
        &self.fill
    }

    /// Map a local point to device space.
    pub fn to_device(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.transform * Point2::new(x, y);
        (p.x, p.y)
    }

    /// Accumulated rotation in radians.
    pub fn angle(&self) -> f64 {
        self.transform.rotation.angle()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

// ---------------------------------------------------------------------------
// RecordingCanvas
// ---------------------------------------------------------------------------

/// One painted primitive, in device space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect {
        center: (f64, f64),
        width: f64,
        height: f64,
        angle: f64,
        color: String,
    },
    Circle {
        center: (f64, f64),
        radius: f64,
        color: String,
    },
    Text {
        text: String,
        center: (f64, f64),
        angle: f64,
        font: Font,
        color: String,
    },
}

impl DrawOp {
    pub fn color(&self) -> &str {
        match self {
            DrawOp::Rect { color, .. } | DrawOp::Circle { color, .. } | DrawOp::Text { color, .. } => {
                color
            }
        }
    }

    pub fn center(&self) -> (f64, f64) {
        match self {
            DrawOp::Rect { center, .. } | DrawOp::Circle { center, .. } | DrawOp::Text { center, .. } => {
                *center
            }
        }
    }
}

/// Canvas that keeps the operations of the current frame.
///
/// `clear` discards them, so after a paint pass [`ops`](Self::ops) is
/// exactly what is on screen.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f64,
    height: f64,
    state: CanvasState,
    ops: Vec<DrawOp>,
    clears: u64,
}

impl RecordingCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            state: CanvasState::default(),
            ops: Vec::new(),
            clears: 0,
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// How many times the surface has been cleared.
    pub fn clear_count(&self) -> u64 {
        self.clears
    }

    /// Open save() calls.
    pub fn save_depth(&self) -> usize {
        self.state.depth()
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.clears += 1;
    }

    fn save(&mut self) {
        self.state.save();
    }

    fn restore(&mut self) {
        self.state.restore();
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.state.translate(x, y);
    }

    fn rotate(&mut self, angle: f64) {
        self.state.rotate(angle);
    }

    fn set_fill_style(&mut self, color: &str) {
        self.state.set_fill(color);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.ops.push(DrawOp::Rect {
            center: self.state.to_device(x + width / 2.0, y + height / 2.0),
            width,
            height,
            angle: self.state.angle(),
            color: self.state.fill().to_owned(),
        });
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64) {
        self.ops.push(DrawOp::Circle {
            center: self.state.to_device(cx, cy),
            radius,
            color: self.state.fill().to_owned(),
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, font: &Font) {
        self.ops.push(DrawOp::Text {
            text: text.to_owned(),
            center: self.state.to_device(x, y),
            angle: self.state.angle(),
            font: font.clone(),
            color: self.state.fill().to_owned(),
        });
    }
}
