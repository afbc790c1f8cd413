//! State machine module.

pub mod machine;

pub use machine::{BoundMode, Operation, SessionState, SessionStatus, TransitionGuard};
