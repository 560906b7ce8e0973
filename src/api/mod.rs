//! HTTP surface: dashboard, access gate, and voice-platform webhooks.
//!
//! `app_router()` returns a composable `Router`; `start_server_on()` binds
//! and serves it.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::app_router;
pub use server::{start_server_on, ApiServer};
pub use types::ApiContext;
