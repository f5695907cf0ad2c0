//! Canvas painting of entities.
//!
//! [`RenderSystem`] paints every entity that has both a
//! [`Transform`](moa_ecs::component::Transform) and a
//! [`Visual`](moa_ecs::component::Visual) onto a [`Canvas`], centered on the
//! transform position and rotated by its angle. The canvas is an abstract 2D
//! drawing surface:
//!
//! - [`RecordingCanvas`] records device-space draw operations. It is what
//!   headless hosts and tests paint into.
//! - `GpuCanvas` (feature `renderer`) tessellates the same operations and
//!   draws them with wgpu in a winit window.

pub mod canvas;
pub mod color;
pub mod system;

#[cfg(feature = "renderer")]
pub mod app;
#[cfg(feature = "renderer")]
mod glyphs;
#[cfg(feature = "renderer")]
pub mod gpu;

pub use canvas::{Canvas, CanvasState, DrawOp, Font, RecordingCanvas};
pub use color::Rgba;
pub use system::RenderSystem;

#[cfg(feature = "renderer")]
pub use app::run_windowed;
#[cfg(feature = "renderer")]
pub use gpu::GpuCanvas;
