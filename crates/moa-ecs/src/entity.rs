//! Entity identity and one-slot-per-kind component storage.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentKind, ComponentPayload};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Opaque string identity of an entity.
///
/// Uniqueness within a [`World`](crate::world::World) is the population
/// logic's responsibility; the world never checks it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EntityId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EntityId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An identity plus at most one component of each [`ComponentKind`].
///
/// Storage is a fixed array indexed by kind, so a second component of the
/// same kind always replaces the first. Systems rely on this single-slot
/// lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    slots: [Option<Component>; ComponentKind::COUNT],
}

impl Entity {
    /// Create an entity with no components.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            slots: Default::default(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Builder: add a component, replacing any existing one of the same kind.
    pub fn with(mut self, component: impl Into<Component>) -> Self {
        self.insert(component);
        self
    }

    /// Add a component, returning the one it replaced.
    pub fn insert(&mut self, component: impl Into<Component>) -> Option<Component> {
        let component = component.into();
        let slot = &mut self.slots[component.kind().index()];
        slot.replace(component)
    }

    pub fn get<T: ComponentPayload>(&self) -> Option<&T> {
        self.slots[T::KIND.index()]
            .as_ref()
            .and_then(T::from_component)
    }

    pub fn get_mut<T: ComponentPayload>(&mut self) -> Option<&mut T> {
        self.slots[T::KIND.index()]
            .as_mut()
            .and_then(T::from_component_mut)
    }

    /// Mutable access to one component alongside shared access to another.
    ///
    /// Returns `None` if either is missing or if `A` and `B` are the same
    /// kind.
    pub fn get_mut_with<A, B>(&mut self) -> Option<(&mut A, &B)>
    where
        A: ComponentPayload,
        B: ComponentPayload,
    {
        let a_idx = A::KIND.index();
        let b_idx = B::KIND.index();
        if a_idx == b_idx {
            return None;
        }

        let (a_slot, b_slot) = if a_idx < b_idx {
            let (lo, hi) = self.slots.split_at_mut(b_idx);
            (&mut lo[a_idx], &hi[0])
        } else {
            let (lo, hi) = self.slots.split_at_mut(a_idx);
            (&mut hi[0], &lo[b_idx])
        };

        let b = B::from_component(b_slot.as_ref()?)?;
        let a = A::from_component_mut(a_slot.as_mut()?)?;
        Some((a, b))
    }

    pub fn remove<T: ComponentPayload>(&mut self) -> Option<T> {
        self.slots[T::KIND.index()]
            .take()
            .and_then(T::from_component_owned)
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&Component> {
        self.slots[kind.index()].as_ref()
    }

    pub fn has(&self, kind: ComponentKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Present components, in [`ComponentKind`] declaration order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn component_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
