//! Non-blocking teleop keypress input.

pub mod keys;

pub use keys::{InputSource, Key};
