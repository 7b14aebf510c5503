//! Shared types for the Wayfarer workspace: chat messages, intents and
//! routing control blocks, slot keys, the workspace-wide error enum, and
//! the environment-driven configuration tree.

pub mod chat;
pub mod config;
pub mod error;
pub mod route;
pub mod slots;

pub use error::{Error, Result};
