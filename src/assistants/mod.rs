//! Typed surface of the hosted assistants API.

pub mod assistants;
pub use assistants::*;

pub mod files;
pub mod messages;
pub mod runs;
pub mod threads;
