use super::entity::EntityRef;

/// Allocates entity indices, recycling destroyed ones through a free list
#[derive(Debug, Default)]
pub struct EntityPool {
    versions: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
}

impl EntityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> EntityRef {
        if let Some(index) = self.free_list.pop() {
            let slot = index as usize;
            self.alive[slot] = true;
            return EntityRef::new(index, self.versions[slot]);
        }

        let index = self.versions.len() as u32;
        self.versions.push(0);
        self.alive.push(true);
        EntityRef::new(index, 0)
    }

    /// Returns false if `entity` was not alive
    pub fn destroy(&mut self, entity: EntityRef) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index as usize;
        self.alive[slot] = false;
        self.versions[slot] = self.versions[slot].wrapping_add(1);
        self.free_list.push(entity.index);
        true
    }

    pub fn is_alive(&self, entity: EntityRef) -> bool {
        let slot = entity.index as usize;
        slot < self.versions.len() && self.alive[slot] && self.versions[slot] == entity.version
    }

    /// The live entity currently occupying `index`
    pub fn current(&self, index: u32) -> Option<EntityRef> {
        let slot = index as usize;
        if slot < self.versions.len() && self.alive[slot] {
            Some(EntityRef::new(index, self.versions[slot]))
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(slot, _)| EntityRef::new(slot as u32, self.versions[slot]))
    }

    pub fn len(&self) -> usize {
        self.versions.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
