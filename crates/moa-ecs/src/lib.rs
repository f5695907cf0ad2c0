//! MOA ECS -- entity/component model, world and state broadcast for the MOA
//! runtime.
//!
//! Entities are an opaque string id plus at most one component of each kind
//! from a closed set (Transform, Visual, UI, Physics, State, Tile,
//! Interactable). The [`World`](world::World) owns the ordered entity
//! sequence and the ordered system list, and after every update offers a
//! snapshot of its entities to a throttled [`Broadcaster`](broadcast::Broadcaster).
//!
//! # Quick Start
//!
//! ```
//! use moa_ecs::prelude::*;
//!
//! let (channel, inbox) = MemoryChannel::new();
//! let mut world = World::with_broadcaster(Broadcaster::new(ThrottlePolicy::Always, channel));
//!
//! world.add_entity(
//!     Entity::new("card-1")
//!         .with(Transform::new(100.0, 100.0, 200.0, 100.0))
//!         .with(Ui::new("div").with_classes("bg-white p-4").with_content("Task: Build ECS"))
//!         .with(State::new("todo")),
//! );
//!
//! world.update(1.0 / 60.0).unwrap();
//! assert_eq!(inbox.last().unwrap().entities.len(), 1);
//! ```

#![deny(unsafe_code)]

pub mod broadcast;
pub mod component;
pub mod entity;
pub mod snapshot;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A system met state it cannot continue from. Fatal to the session.
    #[error("system '{system}' faulted on entity '{entity}': {details}")]
    SystemFault {
        system: String,
        entity: String,
        details: String,
    },

    /// A snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// The host channel rejected a message.
    #[error("host channel unavailable: {0}")]
    Channel(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::broadcast::{
        parse_message, BroadcastMessage, BroadcastOutcome, Broadcaster, HostChannel, HostInbox,
        JsonLinesChannel, MemoryChannel, NullChannel, ThrottlePolicy, MESSAGE_TYPE,
    };
    pub use crate::component::{
        BodyHandle, Component, ComponentKind, ComponentPayload, Interactable, Physics, Shape,
        State, Tile, Transform, Ui, Visual,
    };
    pub use crate::entity::{Entity, EntityId};
    pub use crate::snapshot::{encode_entities, ComponentData, EntityData};
    pub use crate::world::{FnSystem, System, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn kanban_world() -> (World, HostInbox) {
        let (channel, inbox) = MemoryChannel::new();
        let mut world = World::with_broadcaster(Broadcaster::new(ThrottlePolicy::Always, channel));
        for (i, status) in ["todo", "doing", "done"].iter().enumerate() {
            world.add_entity(
                Entity::new(format!("card-{i}"))
                    .with(Transform::new(100.0 + 220.0 * i as f64, 100.0, 200.0, 100.0))
                    .with(Ui::new("div").with_classes("card interactive"))
                    .with(State::new(*status))
                    .with(Interactable::draggable()),
            );
        }
        (world, inbox)
    }

    #[test]
    fn broadcast_count_matches_live_entities() {
        let (mut world, inbox) = kanban_world();
        world.update(1.0 / 60.0).unwrap();
        assert_eq!(inbox.last().unwrap().entities.len(), 3);

        world.remove_entity("card-1");
        world.update(1.0 / 60.0).unwrap();
        let ids: Vec<String> = inbox
            .last()
            .unwrap()
            .entities
            .iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["card-0", "card-2"]);
    }

    #[test]
    fn state_machine_system_advances_cards() {
        let (mut world, inbox) = kanban_world();
        world.add_system_fn("advance", |entities, _dt| {
            for e in entities.iter_mut() {
                if let Some(state) = e.get_mut::<State>() {
                    if state.state == "todo" {
                        state.state = "doing".to_owned();
                    }
                }
            }
        });

        world.update(1.0 / 60.0).unwrap();
        let msg = inbox.last().unwrap();
        let first_state = msg.entities[0]
            .components
            .iter()
            .find_map(|c| match c {
                ComponentData::State { state, .. } => Some(state.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(first_state, "doing");
    }

    #[test]
    fn physics_only_entity_is_broadcast_with_redacted_physics() {
        let (channel, inbox) = MemoryChannel::new();
        let mut world = World::with_broadcaster(Broadcaster::new(ThrottlePolicy::Always, channel));
        world.add_entity(Entity::new("ghost").with(Physics::new(BodyHandle::from_raw_parts(0, 0), true)));

        world.update(1.0 / 60.0).unwrap();
        let msg = inbox.last().unwrap();
        assert_eq!(
            msg.entities[0].components,
            vec![ComponentData::Physics { is_static: true }]
        );
    }
}
