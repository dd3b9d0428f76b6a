use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
};

use super::{entity::EntityRef, entity_pool::EntityPool};
use crate::replication::Replicable;

/// Data attached to an entity. Anything replicable qualifies.
pub trait Component: Replicable {}

impl<T: Replicable> Component for T {}

trait ComponentStorage: Send {
    fn remove_index(&mut self, index: u32);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct SparseStorage<T> {
    values: BTreeMap<u32, T>,
}

impl<T: Component> ComponentStorage for SparseStorage<T> {
    fn remove_index(&mut self, index: u32) {
        self.values.remove(&index);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Minimal entity/component store: typed sparse storages keyed by entity
/// index, plus a queue of destruction notifications.
#[derive(Default)]
pub struct World {
    pool: EntityPool,
    storages: HashMap<TypeId, Box<dyn ComponentStorage>>,
    destroyed: Vec<EntityRef>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> EntityRef {
        self.pool.create()
    }

    /// Removes every component of `entity` and queues a destruction
    /// notification. Returns false if it was already gone.
    pub fn destroy(&mut self, entity: EntityRef) -> bool {
        if !self.pool.destroy(entity) {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_index(entity.index);
        }
        self.destroyed.push(entity);
        true
    }

    pub fn is_alive(&self, entity: EntityRef) -> bool {
        self.pool.is_alive(entity)
    }

    pub fn entity_at(&self, index: u32) -> Option<EntityRef> {
        self.pool.current(index)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.pool.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.pool.len()
    }

    /// Attach or overwrite a component. Returns false if `entity` is dead.
    pub fn insert<T: Component>(&mut self, entity: EntityRef, component: T) -> bool {
        if !self.pool.is_alive(entity) {
            return false;
        }
        self.storage_mut::<T>().values.insert(entity.index, component);
        true
    }

    pub fn remove<T: Component>(&mut self, entity: EntityRef) -> Option<T> {
        if !self.pool.is_alive(entity) {
            return None;
        }
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<SparseStorage<T>>())
            .and_then(|storage| storage.values.remove(&entity.index))
    }

    pub fn get<T: Component>(&self, entity: EntityRef) -> Option<&T> {
        if !self.pool.is_alive(entity) {
            return None;
        }
        self.storage::<T>()
            .and_then(|storage| storage.values.get(&entity.index))
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityRef) -> Option<&mut T> {
        if !self.pool.is_alive(entity) {
            return None;
        }
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<SparseStorage<T>>())
            .and_then(|storage| storage.values.get_mut(&entity.index))
    }

    pub fn has<T: Component>(&self, entity: EntityRef) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Every live entity holding a `T`, in index order
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (EntityRef, &T)> + '_ {
        let pool = &self.pool;
        self.storage::<T>()
            .into_iter()
            .flat_map(|storage| storage.values.iter())
            .filter_map(move |(index, value)| pool.current(*index).map(|entity| (entity, value)))
    }

    pub fn count<T: Component>(&self) -> usize {
        self.storage::<T>()
            .map(|storage| storage.values.len())
            .unwrap_or(0)
    }

    /// Drains destruction notifications queued since the last call
    pub fn take_destroyed(&mut self) -> Vec<EntityRef> {
        std::mem::take(&mut self.destroyed)
    }

    fn storage<T: Component>(&self) -> Option<&SparseStorage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref::<SparseStorage<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> &mut SparseStorage<T> {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(SparseStorage::<T> {
                    values: BTreeMap::new(),
                })
            });
        match storage.as_any_mut().downcast_mut::<SparseStorage<T>>() {
            Some(storage) => storage,
            None => unreachable!("storage registered under the TypeId of another type"),
        }
    }
}
