use std::{
    any::{type_name, TypeId},
    collections::HashMap,
};

use crate::{
    replication::{
        ClassFactory, ComponentChannels, ComponentReplication, ComponentReplicationBase,
        ObjectChannel, Replicate,
    },
    types::ComponentIndex,
    world::Component,
};

pub mod error;
pub use error::ProtocolError;

type ComponentFactory = fn(ComponentIndex) -> Box<dyn ComponentReplicationBase>;

fn make_object<T: Replicate + Default>() -> Box<dyn Replicate> {
    Box::new(T::default())
}

fn make_component_replication<T: Component>(
    index: ComponentIndex,
) -> Box<dyn ComponentReplicationBase> {
    Box::new(ComponentReplication::<T>::new(index))
}

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

/// Everything both sides must agree on: which object classes exist and
/// which component types are replicated, in which order.
#[derive(Clone, Default)]
pub struct Protocol {
    classes: Vec<(&'static str, ClassFactory)>,
    components: Vec<(TypeId, &'static str, ComponentFactory)>,
    locked: bool,
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    /// Registers an id-replicated class. Clients construct it with
    /// `T::default()` when a CREATE names it.
    pub fn add_class<T: Replicate + Default>(&mut self) -> &mut Self {
        match self.try_add_class::<T>() {
            Ok(protocol) => protocol,
            Err(error) => panic!("{}", error),
        }
    }

    /// Registers a replicated component type. Its index is its position in
    /// registration order.
    pub fn add_component<T: Component>(&mut self) -> &mut Self {
        match self.try_add_component::<T>() {
            Ok(protocol) => protocol,
            Err(error) => panic!("{}", error),
        }
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(
        &mut self,
        plugin: P,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_add_class<T: Replicate + Default>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        let name = T::default().class_name();
        if self.classes.iter().any(|(existing, _)| *existing == name) {
            return Err(ProtocolError::DuplicateClass { name });
        }
        self.classes.push((name, make_object::<T> as ClassFactory));
        Ok(self)
    }

    pub fn try_add_component<T: Component>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        let type_id = TypeId::of::<T>();
        if self.components.iter().any(|(existing, _, _)| *existing == type_id) {
            return Err(ProtocolError::DuplicateComponent {
                type_name: type_name::<T>(),
            });
        }
        self.components.push((
            type_id,
            type_name::<T>(),
            make_component_replication::<T> as ComponentFactory,
        ));
        Ok(self)
    }

    pub fn component_index<T: Component>(&self) -> Option<ComponentIndex> {
        let type_id = TypeId::of::<T>();
        self.components
            .iter()
            .position(|(existing, _, _)| *existing == type_id)
            .map(|position| position as ComponentIndex)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.classes.iter().map(|(name, _)| *name)
    }

    pub fn object_channel(&self) -> ObjectChannel {
        ObjectChannel::new(self.classes.iter().copied().collect::<HashMap<_, _>>())
    }

    pub fn component_channels(&self) -> ComponentChannels {
        ComponentChannels::new(
            self.components
                .iter()
                .enumerate()
                .map(|(index, (_, _, factory))| factory(index as ComponentIndex))
                .collect(),
        )
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }
}
