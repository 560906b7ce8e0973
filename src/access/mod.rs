//! Staff access: an account session from the identity provider plus a
//! server-side grant proving the shared pharmacy code was supplied.

pub mod gate;
pub mod gotrue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gate::{AccessGate, GrantStore, ACCESS_COOKIE};
pub use gotrue::GoTrueClient;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Invalid or expired session")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("Pharmacy code is required")]
    CodeRequired,
    #[error("Invalid pharmacy code")]
    InvalidCode,
    #[error("Pharmacy access code required")]
    NoAccessGrant,
    #[error("{0} not configured")]
    NotConfigured(&'static str),
    #[error("Identity provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a password sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_in: u64,
    pub user: AuthUser,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the user behind an access token.
    async fn user_for_token(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
}

/// Shape checks applied before credentials are sent anywhere.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !email.contains('@') {
        return Err(AuthError::InvalidInput("Please enter a valid email address"));
    }
    if password.chars().count() < 6 {
        return Err(AuthError::InvalidInput(
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}
