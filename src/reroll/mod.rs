//! Admission control for random-spot issuance.

pub mod gate;
pub mod selector;

pub use gate::{evaluate, Decision, UnlockKind};
