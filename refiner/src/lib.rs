//! Goal-directed iterative refinement engine.
//!
//! A planner repeatedly picks the first applicable action, applies its belief
//! update and awaits its effect, until a goal holds or a bound is reached. The
//! reference actions generate candidate wordings, rate them concurrently with
//! a weighted focus-group panel and keep the best ones in a bounded ranked
//! store. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (scoring, ranking, planning).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting boundaries (config, collaborators, processes).
//!   Isolated behind traits to enable scripted collaborators in tests.
//!
//! [`refine`] wires the reference actions and goal into the planner.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod refine;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
