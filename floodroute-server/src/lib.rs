//! HTTP surface over the flood-aware route analysis core.
//!
//! All data is loaded once at startup into an [`AppState`] shared by every
//! request; CPU-bound analysis runs on the blocking thread pool.

pub mod arrivals;
pub mod config;
pub mod error;
pub mod loader;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, StartupError};
pub use routes::build_router;
pub use state::AppState;
