/// Utility types shared across the engine

pub mod string_id;

pub use string_id::{StringId, StringRegistry};
