mod channel;
mod component_channels;
mod component_replication;
mod error;
mod field;
mod object;
mod object_channel;
mod value;

pub use channel::{Outbox, ReplicationChannel};
pub use component_channels::ComponentChannels;
pub use component_replication::{ComponentReplication, ComponentReplicationBase};
pub use error::ReplicationError;
pub use field::{Field, FieldTiming, ReplicatedField, SequenceField};
pub use object::{ClientCommand, Replicate};
pub use object_channel::{ClassFactory, ObjectChannel};
pub use value::Replicable;
