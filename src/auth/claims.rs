/// JWT Claims structure
///
/// Represents the payload shared by access and refresh tokens. Both classes
/// carry the same claims; `token_type` tells them apart so neither can be
/// replayed in place of the other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            TokenType::Access => "AccessToken",
            TokenType::Refresh => "RefreshToken",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT Claims for access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Token class
    pub token_type: TokenType,
    /// Owning user's id
    pub user_id: i64,
    /// Unique token id; refresh tokens are revoked by this value
    pub jti: String,
    /// Expiration time (absolute Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create claims for a fresh token issued at `now`
    pub fn new(
        token_type: TokenType,
        user_id: i64,
        now: i64,
        lifetime_seconds: i64,
        issuer: String,
    ) -> Self {
        Self {
            token_type,
            user_id,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            exp: now + lifetime_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// A token is valid on `[iat, exp)`; at `exp` itself it is already expired
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}
