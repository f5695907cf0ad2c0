//! The frame driver: one mounted session of a program.
//!
//! The [`FrameDriver`] is the only actor that advances time. The host calls
//! [`frame`](FrameDriver::frame) once per display refresh; each frame:
//!
//! 1. Applies the pointer drag constraint, then steps the physics engine by
//!    the fixed dt (while the stepper is running).
//! 2. Runs the world's systems in registration order. [`PhysicsSystem`] is
//!    always registered first, so later systems see this frame's poses.
//! 3. Paints the canvas ([`RenderSystem`]).
//! 4. Maps and publishes the overlay.
//! 5. Offers the entity sequence to the throttled broadcast.
//!
//! Elapsed wall time is ignored: every frame advances exactly `fixed_dt`.
//!
//! If a system faults, the session halts. No further frame is scheduled, the
//! canvas and overlay keep their last published state, and input is
//! ignored. Teardown is still required and still runs in full.
//!
//! # Teardown
//!
//! [`teardown`](FrameDriver::teardown) (or dropping the driver) releases the
//! session in a fixed order: cancel the pending frame, remove the key
//! listener, stop the physics stepper, clear the physics world. Each step
//! runs exactly once.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use moa_ecs::broadcast::{BroadcastOutcome, Broadcaster, HostChannel};
use moa_ecs::entity::EntityId;
use moa_ecs::world::World;
use tracing::{debug, error, info};

use crate::config::RuntimeConfig;
use crate::input::{DragConstraint, InputContext, InputHooks, KeyEvent};
use crate::overlay::{map_overlay, OverlayNode};
use crate::physics::{PhysicsSystem, PhysicsWorld, SharedPhysics};
use crate::render::canvas::Canvas;
use crate::render::system::RenderSystem;
use crate::RuntimeError;

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// What population logic gets to work with.
pub struct PopulateContext<'a> {
    pub world: &'a mut World,
    pub physics: &'a mut PhysicsWorld,
    /// For systems that need the physics world at update time. It is
    /// mutably borrowed for the duration of population.
    pub shared_physics: SharedPhysics,
    pub input: &'a mut InputHooks,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

/// A generated application: creates entities, bodies, systems and input
/// handlers once per session.
pub trait Program {
    fn populate(&mut self, ctx: &mut PopulateContext<'_>) -> anyhow::Result<()>;
}

impl<F> Program for F
where
    F: FnMut(&mut PopulateContext<'_>) -> anyhow::Result<()>,
{
    fn populate(&mut self, ctx: &mut PopulateContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// Pin a closure's signature so it can be used as a [`Program`] without
/// annotating the argument type.
pub fn program_fn<F>(f: F) -> F
where
    F: FnMut(&mut PopulateContext<'_>) -> anyhow::Result<()>,
{
    f
}

// ---------------------------------------------------------------------------
// Stepper
// ---------------------------------------------------------------------------

/// Fixed-timestep physics stepper.
#[derive(Debug, Clone)]
pub struct Stepper {
    fixed_dt: f64,
    running: bool,
    steps: u64,
}

impl Stepper {
    pub fn new(fixed_dt: f64) -> Self {
        Self {
            fixed_dt,
            running: true,
            steps: 0,
        }
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Steps taken since creation.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance the physics world one fixed step if running.
    pub fn advance(&mut self, physics: &mut PhysicsWorld) -> bool {
        if !self.running {
            return false;
        }
        physics.step(self.fixed_dt);
        self.steps += 1;
        true
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Lifecycle state of a mounted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Running,
    /// A system faulted; the string is the fault.
    Halted(String),
    TornDown,
}

impl DriverState {
    pub fn is_running(&self) -> bool {
        matches!(self, DriverState::Running)
    }
}

/// What one frame did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// 1-based frame number within the session.
    pub frame: u64,
    /// Entities visited by the render pass.
    pub painted: usize,
    pub overlay_nodes: usize,
    pub broadcast: BroadcastOutcome,
}

/// One release step, in the order teardown performs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    /// The next scheduled frame was cancelled. `pending` is false when none
    /// was scheduled (e.g. after a halt).
    CancelledFrame { pending: bool },
    RemovedKeyListener { installed: bool },
    StoppedStepper,
    /// The physics world released this many bodies.
    ClearedPhysics { bodies: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
    /// Frames completed during the session.
    pub frames: u64,
}

/// Receives each frame's overlay nodes.
pub type OverlaySink = Box<dyn FnMut(&[OverlayNode])>;

// ---------------------------------------------------------------------------
// FrameDriver
// ---------------------------------------------------------------------------

/// One mounted session: world, physics, canvas, input and the frame loop.
pub struct FrameDriver<C: Canvas> {
    config: RuntimeConfig,
    program: Box<dyn Program>,
    world: World,
    physics: SharedPhysics,
    render: RenderSystem<C>,
    input: InputHooks,
    drag: DragConstraint,
    stepper: Stepper,
    overlay: Vec<OverlayNode>,
    overlay_sink: Option<OverlaySink>,
    state: DriverState,
    /// Number of the next scheduled frame; `None` when nothing is scheduled.
    pending_frame: Option<u64>,
    frames: u64,
}

impl<C: Canvas> FrameDriver<C> {
    /// Mount a program: build the world and physics, run population once
    /// and schedule the first frame. The canvas's own size replaces
    /// `config.canvas` when the two disagree.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Config`] for an invalid configuration.
    /// - [`RuntimeError::Populate`] if population logic fails. Nothing is
    ///   scheduled and all session resources are released.
    pub fn mount<P>(
        program: P,
        config: RuntimeConfig,
        canvas: C,
        channel: impl HostChannel + 'static,
    ) -> Result<Self, RuntimeError>
    where
        P: Program + 'static,
    {
        Self::mount_boxed(Box::new(program), config, canvas, channel)
    }

    pub(crate) fn mount_boxed(
        program: Box<dyn Program>,
        mut config: RuntimeConfig,
        canvas: C,
        channel: impl HostChannel + 'static,
    ) -> Result<Self, RuntimeError> {
        // The canvas is authoritative for its own size.
        let actual = (canvas.width(), canvas.height());
        if actual != (config.canvas.width, config.canvas.height) {
            debug!(
                configured_width = config.canvas.width,
                configured_height = config.canvas.height,
                width = actual.0,
                height = actual.1,
                "canvas size differs from configuration; using the canvas"
            );
            config.canvas.width = actual.0;
            config.canvas.height = actual.1;
        }
        config.validate()?;
        let [gx, gy] = config.gravity;
        let mut driver = Self {
            world: World::with_broadcaster(Broadcaster::new(config.broadcast.clone(), channel)),
            physics: Rc::new(RefCell::new(PhysicsWorld::new(gx, gy))),
            render: RenderSystem::new(canvas),
            input: InputHooks::default(),
            drag: DragConstraint::new(&config.drag),
            stepper: Stepper::new(config.fixed_dt),
            overlay: Vec::new(),
            overlay_sink: None,
            state: DriverState::Running,
            pending_frame: None,
            frames: 0,
            program,
            config,
        };
        driver.start()?;
        info!(
            entities = driver.world.entity_count(),
            systems = driver.world.system_count(),
            "session mounted"
        );
        Ok(driver)
    }

    /// Register the physics system, run population and schedule frame 1.
    fn start(&mut self) -> Result<(), RuntimeError> {
        self.world.add_system(PhysicsSystem::new(Rc::clone(&self.physics)));

        let populated = {
            let mut physics = self.physics.borrow_mut();
            let mut ctx = PopulateContext {
                world: &mut self.world,
                physics: &mut physics,
                shared_physics: Rc::clone(&self.physics),
                input: &mut self.input,
                canvas_width: self.render.canvas().width(),
                canvas_height: self.render.canvas().height(),
            };
            self.program.populate(&mut ctx)
        };
        if let Err(e) = populated {
            let details = format!("{e:#}");
            error!(error = %details, "population failed");
            self.release();
            return Err(RuntimeError::Populate(e));
        }

        self.state = DriverState::Running;
        self.pending_frame = Some(1);
        Ok(())
    }

    // -- frame loop -------------------------------------------------------------

    /// Run the scheduled frame.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::Halted`] when a system faults during this frame or
    ///   the session halted earlier.
    /// - [`RuntimeError::NotScheduled`] after teardown.
    pub fn frame(&mut self) -> Result<FrameReport, RuntimeError> {
        if let DriverState::Halted(reason) = &self.state {
            return Err(RuntimeError::Halted(reason.clone()));
        }
        let Some(frame) = self.pending_frame.take() else {
            return Err(RuntimeError::NotScheduled);
        };
        let dt = self.stepper.fixed_dt();

        // Phase 1: physics.
        {
            let mut physics = self.physics.borrow_mut();
            if self.stepper.is_running() {
                self.drag.apply(&mut physics, dt);
            }
            self.stepper.advance(&mut physics);
        }

        // Phase 2: systems.
        if let Err(e) = self.world.run_systems(dt) {
            let reason = e.to_string();
            error!(frame, error = %reason, "system fault; session halted");
            self.state = DriverState::Halted(reason.clone());
            return Err(RuntimeError::Halted(reason));
        }

        // Phase 3: canvas.
        let painted = self.render.paint(self.world.entities());

        // Phase 4: overlay.
        self.overlay = map_overlay(self.world.entities());
        if let Some(sink) = self.overlay_sink.as_mut() {
            sink(&self.overlay);
        }

        // Phase 5: broadcast.
        let broadcast = self.world.broadcast();

        self.frames = frame;
        self.pending_frame = Some(frame + 1);
        Ok(FrameReport {
            frame,
            painted,
            overlay_nodes: self.overlay.len(),
            broadcast,
        })
    }

    /// Run up to `count` frames, stopping at the first error. Returns the
    /// number of frames completed.
    pub fn run_frames(&mut self, count: u64) -> Result<u64, RuntimeError> {
        for i in 0..count {
            if let Err(e) = self.frame() {
                debug!(completed = i, "frame run stopped early");
                return Err(e);
            }
        }
        Ok(count)
    }

    // -- input ------------------------------------------------------------------

    fn accepts_input(&self) -> bool {
        self.state.is_running()
    }

    /// Deliver a key press to the key-down listener. Returns whether a
    /// listener received it.
    pub fn key_down(&mut self, event: &KeyEvent) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let mut physics = self.physics.borrow_mut();
        let mut ctx = InputContext {
            world: &mut self.world,
            physics: &mut physics,
        };
        self.input.key_down(&mut ctx, event)
    }

    /// Primary activation of the overlay node for `id`.
    pub fn activate(&mut self, id: impl Into<EntityId>) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let id = id.into();
        let mut physics = self.physics.borrow_mut();
        let mut ctx = InputContext {
            world: &mut self.world,
            physics: &mut physics,
        };
        self.input.activate(&mut ctx, &id)
    }

    /// Pointer pressed at canvas coordinates. Returns `true` if a body was
    /// grabbed.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let physics = self.physics.borrow();
        self.drag.pointer_down(&physics, x, y).is_some()
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.drag.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.drag.pointer_up();
    }

    // -- accessors ----------------------------------------------------------------

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access between frames, e.g. for a host-side editor.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn physics(&self) -> Ref<'_, PhysicsWorld> {
        self.physics.borrow()
    }

    pub fn canvas(&self) -> &C {
        self.render.canvas()
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        self.render.canvas_mut()
    }

    pub fn stepper(&self) -> &Stepper {
        &self.stepper
    }

    pub fn input(&self) -> &InputHooks {
        &self.input
    }

    pub fn dragged(&self) -> Option<moa_ecs::component::BodyHandle> {
        self.drag.dragged()
    }

    /// Overlay nodes published by the last completed frame.
    pub fn overlay(&self) -> &[OverlayNode] {
        &self.overlay
    }

    /// Receive the overlay after every frame, in addition to
    /// [`overlay`](Self::overlay).
    pub fn on_overlay<F>(&mut self, sink: F)
    where
        F: FnMut(&[OverlayNode]) + 'static,
    {
        self.overlay_sink = Some(Box::new(sink));
    }

    /// Frames completed since mount or the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Number of the next scheduled frame.
    pub fn pending_frame(&self) -> Option<u64> {
        self.pending_frame
    }

    // -- lifecycle --------------------------------------------------------------

    /// Full ordered release, then run the same program again from scratch
    /// with fresh world, physics and input state. The broadcast channel is
    /// kept.
    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        let steps = self.release();
        debug!(?steps, "session released for reset");

        self.world.reset();
        let [gx, gy] = self.config.gravity;
        self.physics = Rc::new(RefCell::new(PhysicsWorld::new(gx, gy)));
        self.input = InputHooks::default();
        self.drag = DragConstraint::new(&self.config.drag);
        self.stepper = Stepper::new(self.config.fixed_dt);
        self.overlay.clear();
        self.frames = 0;
        // Re-arm release so a failed population clears what it built.
        self.state = DriverState::Running;

        if let Err(e) = self.start() {
            self.state = DriverState::Halted(e.to_string());
            return Err(e);
        }
        info!(entities = self.world.entity_count(), "session reset");
        Ok(())
    }

    /// Replace the program and [`reset`](Self::reset).
    pub fn load<P>(&mut self, program: P) -> Result<(), RuntimeError>
    where
        P: Program + 'static,
    {
        self.program = Box::new(program);
        self.reset()
    }

    /// End the session. Runs the ordered release and reports each step.
    pub fn teardown(mut self) -> TeardownReport {
        let steps = self.release();
        TeardownReport {
            steps,
            frames: self.frames,
        }
    }

    /// Ordered release. Idempotent: a second call does nothing.
    fn release(&mut self) -> Vec<TeardownStep> {
        if self.state == DriverState::TornDown {
            return Vec::new();
        }
        let mut steps = Vec::with_capacity(4);

        let pending = self.pending_frame.take().is_some();
        steps.push(TeardownStep::CancelledFrame { pending });

        let installed = self.input.remove_key_listener();
        steps.push(TeardownStep::RemovedKeyListener { installed });

        self.stepper.stop();
        steps.push(TeardownStep::StoppedStepper);

        self.drag.release();
        let bodies = match self.physics.try_borrow_mut() {
            Ok(mut physics) => {
                let bodies = physics.body_count();
                physics.clear();
                bodies
            }
            Err(_) => {
                error!("physics world still borrowed during teardown; not cleared");
                0
            }
        };
        steps.push(TeardownStep::ClearedPhysics { bodies });

        self.world.clear();
        self.state = DriverState::TornDown;
        debug!(?steps, frames = self.frames, "session torn down");
        steps
    }
}

impl<C: Canvas> Drop for FrameDriver<C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: Canvas> std::fmt::Debug for FrameDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDriver")
            .field("state", &self.state)
            .field("frames", &self.frames)
            .field("pending_frame", &self.pending_frame)
            .field("entities", &self.world.entity_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
