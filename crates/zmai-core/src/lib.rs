//! Core types for the zmai chat backend.
//!
//! Holds the conversation entity model, the TOML configuration and the
//! top-level error type shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::ZmaiConfig;
pub use error::{Result, ZmaiError};
pub use types::*;
