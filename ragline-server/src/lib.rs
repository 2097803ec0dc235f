//! HTTP service over a single in-memory `ragline` store.
//!
//! The router exposes ingestion, search, health and usage endpoints. One
//! [`AppState`] is built at startup and shared by every handler.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, app_router, run_server};
