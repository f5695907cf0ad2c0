//! The world: live entity sequence, ordered system list, broadcast step.
//!
//! A [`World`] is the unit of one running session. Each
//! [`update`](World::update):
//!
//! 1. Runs every registered [`System`] in registration order. Each system
//!    receives the world's own entity vector, not a copy, so membership
//!    changes made by one system are visible to every later system in the
//!    same tick.
//! 2. Runs the broadcast step, which encodes the entity sequence and hands it
//!    to the [`Broadcaster`] for throttled emission to the host.
//!
//! The entity vector's order is significant: it is the canvas paint order
//! and the overlay node order.

use tracing::{debug, trace};

use crate::broadcast::{BroadcastOutcome, Broadcaster};
use crate::entity::Entity;
use crate::EcsError;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A procedure applied to the entity sequence once per tick.
///
/// A system that finds an entity without the components it needs must skip
/// it. Returning an error means the session cannot continue (for example an
/// external engine reported inconsistent state) and halts the frame driver.
pub trait System {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    fn update(&mut self, entities: &mut Vec<Entity>, dt: f64) -> Result<(), EcsError>;
}

/// Adapter turning a closure into a [`System`].
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut Vec<Entity>, f64),
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut Vec<Entity>, f64),
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, entities: &mut Vec<Entity>, dt: f64) -> Result<(), EcsError> {
        (self.func)(entities, dt);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Owner of the live entity sequence and the system execution order.
pub struct World {
    entities: Vec<Entity>,
    systems: Vec<Box<dyn System>>,
    broadcaster: Broadcaster,
    update_counter: u64,
}

impl World {
    /// A world whose broadcasts go nowhere.
    pub fn new() -> Self {
        Self::with_broadcaster(Broadcaster::disconnected())
    }

    pub fn with_broadcaster(broadcaster: Broadcaster) -> Self {
        Self {
            entities: Vec::new(),
            systems: Vec::new(),
            broadcaster,
            update_counter: 0,
        }
    }

    // -- entities -----------------------------------------------------------

    /// Append an entity and return a reference to it.
    ///
    /// No uniqueness check is made on the id.
    pub fn add_entity(&mut self, entity: Entity) -> &mut Entity {
        let idx = self.entities.len();
        self.entities.push(entity);
        &mut self.entities[idx]
    }

    /// Drop every entity whose id equals `id`. Returns how many were removed;
    /// zero is not an error.
    pub fn remove_entity(&mut self, id: &str) -> usize {
        let before = self.entities.len();
        self.entities.retain(|e| e.id() != id);
        before - self.entities.len()
    }

    /// First entity with the given id.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// The live entity vector. Systems receive this same vector.
    pub fn entities_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- systems ------------------------------------------------------------

    /// Append a system. Registration order is execution order.
    pub fn add_system(&mut self, system: impl System + 'static) {
        debug!(system = system.name(), position = self.systems.len(), "system registered");
        self.systems.push(Box::new(system));
    }

    /// Append a closure as a system.
    pub fn add_system_fn<F>(&mut self, name: &str, func: F)
    where
        F: FnMut(&mut Vec<Entity>, f64) + 'static,
    {
        self.add_system(FnSystem::new(name, func));
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// System names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    // -- tick ---------------------------------------------------------------

    /// Run every system once, in registration order, over the live entity
    /// sequence.
    ///
    /// Stops at the first system error; systems after it do not run.
    pub fn run_systems(&mut self, dt: f64) -> Result<(), EcsError> {
        self.update_counter += 1;
        for system in &mut self.systems {
            trace!(system = system.name(), tick = self.update_counter, "running system");
            system.update(&mut self.entities, dt)?;
        }
        Ok(())
    }

    /// Encode the entity sequence and offer it to the broadcaster.
    pub fn broadcast(&mut self) -> BroadcastOutcome {
        self.broadcaster.broadcast(&self.entities)
    }

    /// One full update: all systems, then the broadcast step.
    pub fn update(&mut self, dt: f64) -> Result<BroadcastOutcome, EcsError> {
        self.run_systems(dt)?;
        Ok(self.broadcast())
    }

    /// Number of times the systems have been run.
    pub fn update_count(&self) -> u64 {
        self.update_counter
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn broadcaster_mut(&mut self) -> &mut Broadcaster {
        &mut self.broadcaster
    }

    /// Drop all entities and systems. Used when a session is torn down.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.systems.clear();
    }

    /// Back to a freshly constructed state, keeping only the broadcast
    /// channel. The next update is update 1 again.
    pub fn reset(&mut self) {
        self.clear();
        self.update_counter = 0;
        self.broadcaster.reset();
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
