//! HTTP middleware.
//!
//! Execution order (outermost → innermost):
//! 1. Audit logger: every request, including rejected ones
//! 2. Webhook secret (voice-platform routes) or staff session (dashboard)

pub mod audit;
pub mod session;
pub mod webhook_secret;
