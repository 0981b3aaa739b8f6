/// Storage seams
///
/// The session facade only talks to these traits. Postgres implementations
/// back the running service; in-memory ones back tests and embedding.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::auth::Claims;
use crate::error::AppError;
use crate::user::User;

pub use memory::{InMemoryRevocationStore, InMemoryUserStore};
pub use postgres::{PgRevocationStore, PgUserStore};

/// Blacklist entry for a revoked refresh token
#[derive(Debug, Clone, PartialEq)]
pub struct RevocationRecord {
    pub jti: String,
    pub user_id: i64,
    /// `exp` of the revoked token; the entry is kept at least until then
    pub expires_at: i64,
    pub revoked_at: i64,
}

impl RevocationRecord {
    pub fn from_claims(claims: &Claims, revoked_at: i64) -> Self {
        Self {
            jti: claims.jti.clone(),
            user_id: claims.user_id,
            expires_at: claims.exp,
            revoked_at,
        }
    }
}

/// Read access to user records
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Users whose username or email equals `identifier`, ignoring case
    async fn find_by_login(&self, identifier: &str) -> Result<Vec<User>, AppError>;
}

/// Shared record of revoked refresh tokens
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Insert a record; returns `false` if the jti was already revoked
    async fn record(&self, record: RevocationRecord) -> Result<bool, AppError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError>;

    /// Drop entries whose token expired before `now`; returns how many were removed
    async fn purge_expired(&self, now: i64) -> Result<u64, AppError>;
}
