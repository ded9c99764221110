//! The `Agent` type.

pub mod core;

pub use self::core::{Agent, AgentRef, StepCallback};
