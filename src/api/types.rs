//! Shared types for the HTTP layer.

use std::sync::Arc;

use crate::access::{AccessGate, AuthUser, IdentityProvider};
use crate::dashboard::Dashboard;
use crate::store::Store;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes and middleware. Every client handle is
/// constructed once at startup and shared by reference count.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn Store>,
    pub dashboard: Arc<Dashboard>,
    /// `None` when the identity provider is not configured; dashboard
    /// routes then answer with a configuration error.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub gate: Arc<AccessGate>,
    pub webhook_secret: Option<Arc<str>>,
}

// ═══════════════════════════════════════════════════════════
// Staff context: injected by the session middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated staff member, injected into request extensions after
/// the account session (and, on dashboard routes, the access grant) has
/// been verified.
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub user: AuthUser,
    /// Pharmacy access grant token, present on dashboard routes.
    pub grant: Option<String>,
}
