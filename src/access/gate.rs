use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use super::AuthError;

/// Cookie carrying the pharmacy access grant token.
pub const ACCESS_COOKIE: &str = "pharmacyAccess";

/// Lifetime of a pharmacy access grant (24 hours).
pub const GRANT_TTL_SECS: u64 = 86_400;

// ═══════════════════════════════════════════════════════════
// Grant tokens
// ═══════════════════════════════════════════════════════════

/// Hash a grant token using SHA-256. Only hashes are kept in memory.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random grant token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

struct Grant {
    user_id: String,
    expires_at: Instant,
}

/// Outstanding pharmacy access grants, keyed by token hash and bound to
/// the account that supplied the code.
pub struct GrantStore {
    grants: HashMap<[u8; 32], Grant>,
    ttl: Duration,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(GRANT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            grants: HashMap::new(),
            ttl,
        }
    }

    pub fn issue(&mut self, user_id: &str) -> String {
        self.cleanup();
        let token = generate_token();
        self.grants.insert(
            hash_token(&token),
            Grant {
                user_id: user_id.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Valid only for the user it was issued to, and only until expiry.
    pub fn is_valid(&self, token: &str, user_id: &str) -> bool {
        match self.grants.get(&hash_token(token)) {
            Some(grant) => grant.user_id == user_id && Instant::now() < grant.expires_at,
            None => false,
        }
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.grants.remove(&hash_token(token)).is_some()
    }

    fn cleanup(&mut self) {
        let now = Instant::now();
        self.grants.retain(|_, g| now < g.expires_at);
    }
}

impl Default for GrantStore {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Access gate
// ═══════════════════════════════════════════════════════════

/// Second factor of dashboard access: the shared pharmacy code.
pub struct AccessGate {
    access_code: Option<String>,
    secure_cookies: bool,
    grants: Mutex<GrantStore>,
}

impl AccessGate {
    pub fn new(access_code: Option<String>, secure_cookies: bool) -> Self {
        Self {
            access_code,
            secure_cookies,
            grants: Mutex::new(GrantStore::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_grants(mut self, grants: GrantStore) -> Self {
        self.grants = Mutex::new(grants);
        self
    }

    /// Check a submitted code against the configured one. Surrounding
    /// whitespace is ignored; the comparison itself is constant-time.
    pub fn check_code(&self, submitted: Option<&str>) -> Result<(), AuthError> {
        let expected = self
            .access_code
            .as_deref()
            .ok_or(AuthError::NotConfigured("PHARMACY_ACCESS_CODE"))?;

        let submitted = submitted.map(str::trim).unwrap_or_default();
        if submitted.is_empty() {
            return Err(AuthError::CodeRequired);
        }

        if bool::from(submitted.as_bytes().ct_eq(expected.trim().as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::InvalidCode)
        }
    }

    /// Validate the code and, on success, issue a grant for `user_id`.
    pub fn unlock(&self, user_id: &str, submitted: Option<&str>) -> Result<String, AuthError> {
        self.check_code(submitted)?;
        let mut grants = self
            .grants
            .lock()
            .map_err(|_| AuthError::Provider("grant store lock poisoned".into()))?;
        Ok(grants.issue(user_id))
    }

    pub fn has_access(&self, token: &str, user_id: &str) -> bool {
        self.grants
            .lock()
            .map(|g| g.is_valid(token, user_id))
            .unwrap_or(false)
    }

    pub fn revoke(&self, token: &str) {
        if let Ok(mut grants) = self.grants.lock() {
            grants.revoke(token);
        }
    }

    pub fn access_cookie(&self, token: &str) -> String {
        self.cookie(token, GRANT_TTL_SECS)
    }

    pub fn cleared_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{ACCESS_COOKIE}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax"
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Read the access grant token from the request's `Cookie` headers.
pub fn grant_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
