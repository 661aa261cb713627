//! Gait keyframe tables and the tick-driven scheduler that plays them.

pub mod engine;
pub mod library;

pub use engine::GaitEngine;
pub use library::{deg_to_raw, Action, Keyframe};
