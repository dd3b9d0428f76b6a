use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// Two classes share a name
    #[error("Class name '{name}' is already registered")]
    DuplicateClass { name: &'static str },

    /// A component type was added twice
    #[error("Component type {type_name} is already registered")]
    DuplicateComponent { type_name: &'static str },
}
