//! zmai API crate - axum HTTP server and route handlers.
//!
//! Exposes conversation management, direct web search and chat turns as a
//! JSON API, plus an optional prebuilt frontend.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
