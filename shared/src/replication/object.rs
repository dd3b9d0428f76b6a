use std::any::Any;

use tether_serde::{ByteReader, SerdeErr};

use super::{field::ReplicatedField, value::Replicable};
use crate::{
    types::{ClientId, FieldIndex},
    world::{HostEntityConverter, World},
};

/// An object replicated by server-assigned id. Fields are addressed by
/// their position.
pub trait Replicate: Any + Send {
    /// Name the receiving side uses to construct the object
    fn class_name(&self) -> &'static str;

    fn field_count(&self) -> FieldIndex;

    fn field(&self, index: FieldIndex) -> Option<&dyn ReplicatedField>;

    fn field_mut(&mut self, index: FieldIndex) -> Option<&mut dyn ReplicatedField>;

    /// Called on the server when a client addresses a command to this object
    fn on_client_command(&mut self, _command: &mut ClientCommand<'_>) {}

    /// Called on every client when the server addresses a command to this
    /// object
    fn on_server_command(&mut self, _reader: &mut ByteReader<'_>) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A client command being dispatched on the server
pub struct ClientCommand<'a> {
    client_id: ClientId,
    reader: ByteReader<'a>,
    entities: HostEntityConverter<'a>,
}

impl<'a> ClientCommand<'a> {
    pub fn new(client_id: ClientId, payload: &'a [u8], world: &'a World) -> Self {
        Self {
            client_id,
            reader: ByteReader::new(payload),
            entities: HostEntityConverter::new(world),
        }
    }

    /// Sender of the command, or 0 for the server itself
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Reads the next value, resolving client-authored entity references
    pub fn read<T: Replicable>(&mut self) -> Result<T, SerdeErr> {
        T::read(&mut self.reader, &mut self.entities)
    }

    pub fn reader(&mut self) -> &mut ByteReader<'a> {
        &mut self.reader
    }
}

/// Implements [`Replicate`] for a struct whose replicated fields are listed
/// in index order. Any further tokens become extra trait items, typically
/// command handlers.
///
/// ```
/// use tether_shared::{impl_replicate, Field};
///
/// #[derive(Default)]
/// struct Door {
///     open: Field<bool>,
///     label: Field<String>,
/// }
///
/// impl_replicate!(Door, "Door", [open, label]);
/// ```
#[macro_export]
macro_rules! impl_replicate {
    ($ty:ident, $class:literal, [$($field:ident),* $(,)?] $($extra:tt)*) => {
        impl $crate::Replicate for $ty {
            fn class_name(&self) -> &'static str {
                $class
            }

            #[allow(unused_mut)]
            fn field_count(&self) -> $crate::FieldIndex {
                let mut count: $crate::FieldIndex = 0;
                $( let _ = stringify!($field); count += 1; )*
                count
            }

            #[allow(unused_mut, unused_assignments)]
            fn field(
                &self,
                index: $crate::FieldIndex,
            ) -> Option<&dyn $crate::ReplicatedField> {
                let mut position: $crate::FieldIndex = 0;
                $(
                    if index == position {
                        return Some(&self.$field);
                    }
                    position += 1;
                )*
                None
            }

            #[allow(unused_mut, unused_assignments)]
            fn field_mut(
                &mut self,
                index: $crate::FieldIndex,
            ) -> Option<&mut dyn $crate::ReplicatedField> {
                let mut position: $crate::FieldIndex = 0;
                $(
                    if index == position {
                        return Some(&mut self.$field);
                    }
                    position += 1;
                )*
                None
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            $($extra)*
        }
    };
}
