mod entity;
mod entity_converter;
mod entity_pool;
mod world;

pub use entity::EntityRef;
pub use entity_converter::{
    EntityReader, EntityWriter, HostEntityConverter, RemoteEntityMap, RemoteEntityReader,
};
pub use entity_pool::EntityPool;
pub use world::{Component, World};
