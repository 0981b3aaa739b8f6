/// Session facade
///
/// Composes credential verification, token issuance/validation and the
/// revocation store into the four session operations. Holds no per-session
/// state of its own: a session is its refresh token, and it ends when that
/// token is blacklisted.

use std::sync::Arc;

use crate::auth::claims::{Claims, TokenType};
use crate::auth::credentials::CredentialVerifier;
use crate::auth::jwt::{TokenPair, TokenService};
use crate::error::{AppError, AuthError};
use crate::store::{RevocationRecord, UserStore};
use crate::user::{User, UserProfile};

pub struct SessionService {
    users: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    tokens: TokenService,
}

/// Outcome of a logout call; every variant is reported to the client as success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    Revoked,
    AlreadyRevoked,
    /// Token did not validate (malformed, foreign, expired); nothing to revoke
    Ignored,
}

impl SessionService {
    pub fn new(users: Arc<dyn UserStore>, verifier: CredentialVerifier, tokens: TokenService) -> Self {
        Self {
            users,
            verifier,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Anonymous -> Authenticated
    ///
    /// # Errors
    /// `InvalidCredentials` for any bad username/password combination
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self.verifier.verify(username, password).await?;
        let pair = self.tokens.issue_pair(&user)?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(pair)
    }

    /// Mint a new access token from a live refresh token
    ///
    /// # Errors
    /// `TokenInvalid`, `TokenExpired`, `TokenRevoked`, or `NoActiveAccount`
    /// when the owner has since been removed or deactivated
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self.tokens.validate(refresh_token, TokenType::Refresh).await?;

        match self.users.find_by_id(claims.user_id).await? {
            Some(user) if user.can_authenticate() => {}
            _ => return Err(AuthError::NoActiveAccount.into()),
        }

        let access = self.tokens.issue_access(claims.user_id)?;
        tracing::info!(user_id = claims.user_id, "Access token refreshed");
        Ok(access)
    }

    /// Authenticated -> LoggedOut for this refresh token
    ///
    /// Idempotent. Tokens that fail validation are not an error: the client is
    /// discarding them either way.
    ///
    /// # Errors
    /// Only store failures
    pub async fn logout(&self, refresh_token: &str) -> Result<LogoutOutcome, AppError> {
        let claims = match self.tokens.validate(refresh_token, TokenType::Refresh).await {
            Ok(claims) => claims,
            Err(AppError::Auth(AuthError::TokenRevoked)) => return Ok(LogoutOutcome::AlreadyRevoked),
            Err(AppError::Auth(e)) => {
                tracing::debug!(error = %e, "Logout with unusable refresh token");
                return Ok(LogoutOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        let record = RevocationRecord::from_claims(&claims, self.tokens.now());
        let outcome = if self.tokens.revocations().record(record).await? {
            LogoutOutcome::Revoked
        } else {
            LogoutOutcome::AlreadyRevoked
        };

        tracing::info!(user_id = claims.user_id, jti = %claims.jti, ?outcome, "User logged out");
        Ok(outcome)
    }

    /// Profile of the user behind a raw access token
    ///
    /// # Errors
    /// Token errors, `UserNotFound`, `UserInactive`
    pub async fn me(&self, access_token: &str) -> Result<UserProfile, AppError> {
        let claims = self.tokens.validate_access(access_token)?;
        Ok(self.current_user(&claims).await?.profile())
    }

    /// User behind already-validated access claims
    ///
    /// # Errors
    /// `UserNotFound`, `UserInactive`
    pub async fn current_user(&self, claims: &Claims) -> Result<User, AppError> {
        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.can_authenticate() {
            return Err(AuthError::UserInactive.into());
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::clock::ManualClock;
    use crate::configuration::JwtSettings;
    use crate::store::{InMemoryRevocationStore, InMemoryUserStore};
    use crate::user::Role;

    const START: i64 = 1_700_000_000;
    const FIFTEEN_MINUTES: i64 = 15 * 60;

    struct Fixture {
        session: SessionService,
        clock: Arc<ManualClock>,
        users: Arc<InMemoryUserStore>,
        revocations: Arc<InMemoryRevocationStore>,
    }

    fn john() -> User {
        User {
            id: 1,
            username: "john_doe".to_string(),
            email: "john@example.com".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            is_manager: false,
            role: Role::Consultant,
            is_active: true,
            password_hash: hash_password("correct", 4).unwrap(),
        }
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(START));
        let users = Arc::new(InMemoryUserStore::new());
        users.insert(john()).unwrap();
        let revocations = Arc::new(InMemoryRevocationStore::new());

        let jwt = JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: FIFTEEN_MINUTES,
            refresh_token_expiry: 7 * 24 * 60 * 60,
            issuer: "test".to_string(),
        };
        let tokens = TokenService::new(&jwt, clock.clone(), revocations.clone());
        let verifier = CredentialVerifier::new(users.clone(), 4).unwrap();

        Fixture {
            session: SessionService::new(users.clone(), verifier, tokens),
            clock,
            users,
            revocations,
        }
    }

    fn auth_error(result: Result<impl std::fmt::Debug, AppError>) -> AuthError {
        result.unwrap_err().as_auth().expect("expected an auth error")
    }

    #[tokio::test]
    async fn test_login_then_me_returns_profile() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        let profile = f.session.me(&pair.access).await.unwrap();
        assert_eq!(profile.id, 1);
        assert_eq!(profile.username, "john_doe");
    }

    #[tokio::test]
    async fn test_access_token_expires_after_fifteen_minutes() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        f.clock.advance(FIFTEEN_MINUTES - 1);
        assert!(f.session.me(&pair.access).await.is_ok());

        f.clock.advance(1);
        assert_eq!(
            auth_error(f.session.me(&pair.access).await),
            AuthError::TokenExpired(TokenType::Access)
        );
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_revoked() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        let access = f.session.refresh(&pair.refresh).await.unwrap();
        assert!(f.session.me(&access).await.is_ok());

        assert_eq!(f.session.logout(&pair.refresh).await.unwrap(), LogoutOutcome::Revoked);
        assert_eq!(auth_error(f.session.refresh(&pair.refresh).await), AuthError::TokenRevoked);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        assert_eq!(f.session.logout(&pair.refresh).await.unwrap(), LogoutOutcome::Revoked);
        assert_eq!(
            f.session.logout(&pair.refresh).await.unwrap(),
            LogoutOutcome::AlreadyRevoked
        );
        assert_eq!(f.revocations.len(), 1);
    }

    #[tokio::test]
    async fn test_logout_with_garbage_is_ignored() {
        let f = fixture();
        assert_eq!(f.session.logout("not-a-token").await.unwrap(), LogoutOutcome::Ignored);
        assert!(f.revocations.is_empty());
    }

    #[tokio::test]
    async fn test_logout_only_ends_that_session() {
        let f = fixture();
        let first = f.session.login("john_doe", "correct").await.unwrap();
        let second = f.session.login("john_doe", "correct").await.unwrap();

        f.session.logout(&first.refresh).await.unwrap();

        assert!(f.session.refresh(&second.refresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_token_expires_after_seven_days() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        f.clock.advance(7 * 24 * 60 * 60);
        assert_eq!(
            auth_error(f.session.refresh(&pair.refresh).await),
            AuthError::TokenExpired(TokenType::Refresh)
        );
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        assert_eq!(
            auth_error(f.session.refresh(&pair.access).await),
            AuthError::TokenInvalid(TokenType::Refresh)
        );
    }

    #[tokio::test]
    async fn test_deactivated_user_loses_session() {
        let f = fixture();
        let pair = f.session.login("john_doe", "correct").await.unwrap();

        let mut deactivated = john();
        deactivated.is_active = false;
        f.users.insert(deactivated).unwrap();

        assert_eq!(auth_error(f.session.refresh(&pair.refresh).await), AuthError::NoActiveAccount);
        assert_eq!(auth_error(f.session.me(&pair.access).await), AuthError::UserInactive);
    }

    #[tokio::test]
    async fn test_bad_login_stays_anonymous() {
        let f = fixture();
        assert_eq!(
            auth_error(f.session.login("john_doe", "wrong").await),
            AuthError::InvalidCredentials
        );
    }
}
