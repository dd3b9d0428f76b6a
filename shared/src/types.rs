/// Server-assigned connection identity. Real ids start at 1; 0 means the
/// server itself.
pub type ClientId = i32;

/// Server-assigned identity of an id-replicated object. Starts at 1.
pub type ObjectId = i32;

/// Position of a component type in the protocol's registration order
pub type ComponentIndex = u16;

/// Index of a field inside an id-replicated object
pub type FieldIndex = u16;

pub const SERVER_CLIENT_ID: ClientId = 0;
