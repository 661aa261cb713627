//! Autonomy policy: converts vision output into gait commands.

pub mod policy;

pub use policy::{AutonomyPolicy, Mode};
