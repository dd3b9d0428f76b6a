pub mod harness;

pub use harness::*;
pub use test_protocol::{protocol, Health, Position, Ship};
