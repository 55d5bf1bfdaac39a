//! I/O helpers: configuration, collaborator boundaries and the reference
//! subprocess transport.

pub mod collaborator;
pub mod command;
pub mod config;
pub mod process;
pub mod schema;
