//! The capability surface a host ECS must provide so the client/server
//! pipelines can create, query, and tick networked entities without this
//! crate depending on any particular ECS implementation.
//!
//! A real binding lives in whatever engine embeds this crate (Bevy,
//! Legion, a bespoke ECS). `InMemoryEcs` below is this crate's own
//! minimal `HostEcs`, the same role `transport::memory` plays for
//! `Transport`: a real, usable implementation for a host with no ECS of
//! its own, and the fixture this crate's tests drive against.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Opaque reference to an entity inside the host's ECS. The host decides
/// what this wraps (a generational index, a raw id, ...); this crate
/// only ever compares handles for equality and stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u64);

/// When a registered system should run relative to the fixed simulation
/// step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSchedule {
    /// Runs once per fixed simulation tick, in priority order.
    Fixed { priority: i32 },
    /// Runs once per host update call, regardless of how many (or how
    /// few) fixed ticks happened that frame.
    Variable,
}

#[derive(Debug, Clone, Copy)]
pub struct SystemSpec {
    pub schedule: SystemSchedule,
}

/// The capability surface the client and server pipelines need from a
/// host ECS: create/destroy entities by handle, attach/query/remove
/// components by type, iterate matching entities, and register systems
/// against the fixed/variable schedule.
pub trait HostEcs {
    fn create_entity(&mut self) -> EntityHandle;
    fn destroy_entity(&mut self, handle: EntityHandle);

    fn add_component<C: 'static>(&mut self, handle: EntityHandle, component: C);
    fn get_component<C: 'static>(&self, handle: EntityHandle) -> Option<&C>;
    fn get_component_mut<C: 'static>(&mut self, handle: EntityHandle) -> Option<&mut C>;
    fn has_component<C: 'static>(&self, handle: EntityHandle) -> bool;
    fn remove_component<C: 'static>(&mut self, handle: EntityHandle) -> Option<C>;

    fn query<C: 'static>(&self) -> Vec<EntityHandle>;

    fn register_system(&mut self, spec: SystemSpec);
}

pub struct InMemoryEcs {
    next_handle: u64,
    alive: std::collections::HashSet<EntityHandle>,
    components: HashMap<TypeId, HashMap<EntityHandle, Box<dyn Any>>>,
    registered_systems: Vec<SystemSpec>,
}

impl Default for InMemoryEcs {
    fn default() -> Self {
        Self { next_handle: 0, alive: Default::default(), components: HashMap::new(), registered_systems: Vec::new() }
    }
}

impl InMemoryEcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_system_count(&self) -> usize {
        self.registered_systems.len()
    }
}

impl HostEcs for InMemoryEcs {
    fn create_entity(&mut self) -> EntityHandle {
        let handle = EntityHandle(self.next_handle);
        self.next_handle += 1;
        self.alive.insert(handle);
        handle
    }

    fn destroy_entity(&mut self, handle: EntityHandle) {
        self.alive.remove(&handle);
        for store in self.components.values_mut() {
            store.remove(&handle);
        }
    }

    fn add_component<C: 'static>(&mut self, handle: EntityHandle, component: C) {
        self.components.entry(TypeId::of::<C>()).or_default().insert(handle, Box::new(component));
    }

    fn get_component<C: 'static>(&self, handle: EntityHandle) -> Option<&C> {
        self.components.get(&TypeId::of::<C>())?.get(&handle)?.downcast_ref::<C>()
    }

    fn get_component_mut<C: 'static>(&mut self, handle: EntityHandle) -> Option<&mut C> {
        self.components.get_mut(&TypeId::of::<C>())?.get_mut(&handle)?.downcast_mut::<C>()
    }

    fn has_component<C: 'static>(&self, handle: EntityHandle) -> bool {
        self.components.get(&TypeId::of::<C>()).map(|store| store.contains_key(&handle)).unwrap_or(false)
    }

    fn remove_component<C: 'static>(&mut self, handle: EntityHandle) -> Option<C> {
        let boxed = self.components.get_mut(&TypeId::of::<C>())?.remove(&handle)?;
        boxed.downcast::<C>().ok().map(|c| *c)
    }

    fn query<C: 'static>(&self) -> Vec<EntityHandle> {
        match self.components.get(&TypeId::of::<C>()) {
            Some(store) => store.keys().copied().collect(),
            None => Vec::new(),
        }
    }

    fn register_system(&mut self, spec: SystemSpec) {
        self.registered_systems.push(spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);

    #[test]
    fn components_can_be_added_queried_and_removed() {
        let mut ecs = InMemoryEcs::new();
        let entity = ecs.create_entity();
        ecs.add_component(entity, Health(10));

        assert!(ecs.has_component::<Health>(entity));
        assert_eq!(ecs.get_component::<Health>(entity), Some(&Health(10)));
        assert_eq!(ecs.query::<Health>(), vec![entity]);

        let removed = ecs.remove_component::<Health>(entity);
        assert_eq!(removed, Some(Health(10)));
        assert!(!ecs.has_component::<Health>(entity));
    }

    #[test]
    fn destroying_an_entity_drops_its_components() {
        let mut ecs = InMemoryEcs::new();
        let entity = ecs.create_entity();
        ecs.add_component(entity, Health(5));
        ecs.destroy_entity(entity);
        assert!(!ecs.has_component::<Health>(entity));
    }

    #[test]
    fn systems_register_with_their_schedule() {
        let mut ecs = InMemoryEcs::new();
        ecs.register_system(SystemSpec { schedule: SystemSchedule::Fixed { priority: 0 } });
        ecs.register_system(SystemSpec { schedule: SystemSchedule::Variable });
        assert_eq!(ecs.registered_system_count(), 2);
    }
}
