//! MOA Engine -- the runtime every generated MOA application runs inside.
//!
//! This crate builds on [`moa_ecs`] to provide the session driver: a
//! fixed-timestep [`FrameDriver`](frame::FrameDriver) that, once per display
//! frame, steps the rapier2d physics engine, runs the world's systems, paints
//! canvas entities, maps UI entities to overlay nodes and offers the entity
//! sequence to the throttled host broadcast.
//!
//! # Quick Start
//!
//! ```
//! use moa_engine::prelude::*;
//!
//! let program = program_fn(|ctx| {
//!     let body = ctx.physics.add_body(&BodyDesc::rectangle(400.0, 100.0, 40.0, 40.0));
//!     ctx.world.add_entity(
//!         Entity::new("box")
//!             .with(Transform::new(400.0, 100.0, 40.0, 40.0))
//!             .with(Visual::rect("#ff0000"))
//!             .with(body),
//!     );
//!     Ok(())
//! });
//!
//! let (channel, inbox) = MemoryChannel::new();
//! let mut driver = FrameDriver::mount(
//!     program,
//!     RuntimeConfig::default(),
//!     RecordingCanvas::new(800.0, 600.0),
//!     channel,
//! )
//! .unwrap();
//!
//! driver.run_frames(60).unwrap();
//! let y = driver.world().entity("box").unwrap().get::<Transform>().unwrap().y;
//! assert!(y > 100.0, "box should fall under gravity");
//! assert_eq!(inbox.len(), 1);
//!
//! let report = driver.teardown();
//! assert_eq!(report.steps.len(), 4);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod frame;
pub mod input;
pub mod overlay;
pub mod physics;
pub mod render;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS crate for convenience.
pub use moa_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The configuration is unusable.
    #[error("invalid runtime config: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("failed to read runtime config from {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid JSON for [`config::RuntimeConfig`].
    #[error("failed to parse runtime config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The program's population logic failed; the session never started.
    #[error("population logic failed: {0:#}")]
    Populate(#[source] anyhow::Error),

    /// The session faulted earlier and no longer schedules frames.
    #[error("session halted: {0}")]
    Halted(String),

    /// A frame was invoked while none was scheduled.
    #[error("no frame is scheduled")]
    NotScheduled,

    /// An ECS-level error surfaced through the driver.
    #[error(transparent)]
    Ecs(#[from] moa_ecs::EcsError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the ECS prelude.
    pub use moa_ecs::prelude::*;

    pub use crate::config::{CanvasConfig, DragConfig, RuntimeConfig};
    pub use crate::frame::{
        program_fn, DriverState, FrameDriver, FrameReport, PopulateContext, Program, Stepper,
        TeardownReport, TeardownStep,
    };
    pub use crate::input::{DragConstraint, HandlerRegistry, InputContext, InputHooks, KeyEvent};
    pub use crate::overlay::{map_overlay, OverlayNode};
    pub use crate::physics::{
        BodyDesc, BodyPose, BodyShape, PhysicsSystem, PhysicsWorld, SharedPhysics,
        PHYSICS_SYSTEM_NAME,
    };
    pub use crate::render::{Canvas, CanvasState, DrawOp, Font, RecordingCanvas, RenderSystem, Rgba};
    pub use crate::RuntimeError;
}
