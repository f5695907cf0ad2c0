//! Keyboard, activation and pointer-drag input.
//!
//! Input never runs inside a frame. The host delivers events to the frame
//! driver between frames, and the driver forwards them here with mutable
//! access to the world and the physics world through an [`InputContext`].
//!
//! - **Key down**: at most one listener, installed by population logic and
//!   removed during teardown.
//! - **Activation**: primary activation of an overlay node. The entity's
//!   [`Interactable`] handler name (if any) is looked up in the
//!   [`HandlerRegistry`], then the generic activation hook fires.
//! - **Drag**: a [`DragConstraint`] pulls the dynamic body under the pointer
//!   toward it before each physics step.

use std::collections::HashMap;

use moa_ecs::component::{BodyHandle, Interactable};
use moa_ecs::entity::EntityId;
use moa_ecs::world::World;
use tracing::{debug, info, warn};

use crate::config::DragConfig;
use crate::physics::PhysicsWorld;

/// Mutable access handed to input callbacks.
pub struct InputContext<'a> {
    pub world: &'a mut World,
    pub physics: &'a mut PhysicsWorld,
}

/// A key press, named like a DOM `KeyboardEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Logical key, e.g. `"a"`, `"ArrowLeft"`, `" "`.
    pub key: String,
    /// Physical key, e.g. `"KeyA"`, `"ArrowLeft"`, `"Space"`.
    pub code: String,
    /// Auto-repeat from a held key.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            repeat: false,
        }
    }

    /// Key and code are the same string, as for named keys.
    pub fn named(key: &str) -> Self {
        Self::new(key, key)
    }
}

pub type KeyHandler = Box<dyn FnMut(&mut InputContext<'_>, &KeyEvent)>;
pub type ActivationHandler = Box<dyn FnMut(&mut InputContext<'_>, &EntityId)>;

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

/// Activation handlers addressable by the name stored in
/// [`Interactable::handler`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, ActivationHandler>,
}

impl HandlerRegistry {
    /// Register or replace the handler for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: FnMut(&mut InputContext<'_>, &EntityId) + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `name`. Returns `false` if there is none.
    pub fn dispatch(&mut self, name: &str, ctx: &mut InputContext<'_>, id: &EntityId) -> bool {
        match self.handlers.get_mut(name) {
            Some(handler) => {
                handler(ctx, id);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// InputHooks
// ---------------------------------------------------------------------------

/// The key-down listener, the generic activation hook and named handlers.
#[derive(Default)]
pub struct InputHooks {
    key_down: Option<KeyHandler>,
    activation: Option<ActivationHandler>,
    handlers: HandlerRegistry,
}

impl InputHooks {
    /// Install the key-down listener, replacing any previous one.
    pub fn on_key_down<F>(&mut self, handler: F)
    where
        F: FnMut(&mut InputContext<'_>, &KeyEvent) + 'static,
    {
        self.key_down = Some(Box::new(handler));
    }

    /// Install the generic activation hook, replacing any previous one.
    pub fn on_activate<F>(&mut self, handler: F)
    where
        F: FnMut(&mut InputContext<'_>, &EntityId) + 'static,
    {
        self.activation = Some(Box::new(handler));
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn has_key_listener(&self) -> bool {
        self.key_down.is_some()
    }

    /// Detach the key-down listener. Returns whether one was installed.
    pub fn remove_key_listener(&mut self) -> bool {
        self.key_down.take().is_some()
    }

    /// Deliver a key press. Returns whether a listener received it.
    pub fn key_down(&mut self, ctx: &mut InputContext<'_>, event: &KeyEvent) -> bool {
        match self.key_down.as_mut() {
            Some(handler) => {
                handler(ctx, event);
                true
            }
            None => false,
        }
    }

    /// Primary activation of the overlay node for `id`.
    ///
    /// Returns `false` if no live entity has that id.
    pub fn activate(&mut self, ctx: &mut InputContext<'_>, id: &EntityId) -> bool {
        let Some(entity) = ctx.world.entity(id.as_str()) else {
            debug!(entity = %id, "activation for unknown entity ignored");
            return false;
        };
        info!(entity = %id, "interacted with");

        let handler = entity
            .get::<Interactable>()
            .and_then(|i| i.handler.clone());
        if let Some(name) = handler {
            if !self.handlers.dispatch(&name, ctx, id) {
                warn!(entity = %id, handler = %name, "no handler registered under this name");
            }
        }
        if let Some(hook) = self.activation.as_mut() {
            hook(ctx, id);
        }
        true
    }
}

impl std::fmt::Debug for InputHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputHooks")
            .field("key_down", &self.key_down.is_some())
            .field("activation", &self.activation.is_some())
            .field("handlers", &self.handlers)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DragConstraint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Grab {
    body: BodyHandle,
    local_anchor: (f64, f64),
}

/// Pointer-driven spring between the pointer and a grabbed dynamic body.
#[derive(Debug, Clone, PartialEq)]
pub struct DragConstraint {
    enabled: bool,
    stiffness: f64,
    pointer: (f64, f64),
    grab: Option<Grab>,
}

impl DragConstraint {
    pub fn new(config: &DragConfig) -> Self {
        Self {
            enabled: config.enabled,
            stiffness: config.stiffness,
            pointer: (0.0, 0.0),
            grab: None,
        }
    }

    /// Primary button pressed. Grabs the dynamic body under the pointer, if
    /// any, at the exact point that was clicked.
    pub fn pointer_down(&mut self, physics: &PhysicsWorld, x: f64, y: f64) -> Option<BodyHandle> {
        self.pointer = (x, y);
        if !self.enabled {
            return None;
        }
        let body = physics.body_at_point(x, y)?;
        let local_anchor = physics.to_local_point(body, x, y)?;
        debug!(%body, x, y, "drag started");
        self.grab = Some(Grab { body, local_anchor });
        Some(body)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.pointer = (x, y);
    }

    /// Primary button released.
    pub fn pointer_up(&mut self) {
        if let Some(grab) = self.grab.take() {
            debug!(body = %grab.body, "drag ended");
        }
    }

    /// Body currently held, if any.
    pub fn dragged(&self) -> Option<BodyHandle> {
        self.grab.map(|g| g.body)
    }

    /// Pull the held body toward the pointer. Call before each physics step.
    /// A grab whose body has disappeared is released.
    pub fn apply(&mut self, physics: &mut PhysicsWorld, dt: f64) {
        let Some(grab) = self.grab else {
            return;
        };
        if !physics.pull_toward(grab.body, grab.local_anchor, self.pointer, self.stiffness, dt) {
            debug!(body = %grab.body, "dragged body is gone; releasing");
            self.grab = None;
        }
    }

    /// Drop any grab.
    pub fn release(&mut self) {
        self.grab = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
