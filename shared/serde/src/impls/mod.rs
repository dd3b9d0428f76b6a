mod primitives;
mod string;
mod vectors;

pub use vectors::{Color, Vector2, Vector3};
