//! Deterministic, pure logic shared by the refinement engine.
//!
//! Core modules must be free of I/O side effects. The planner awaits effects
//! but never performs I/O itself; collaborators live in [`crate::io`].

pub mod consensus;
pub mod creative;
pub mod error;
pub mod goal;
pub mod planner;
pub mod ranked_store;
pub mod rating;
pub mod state;
