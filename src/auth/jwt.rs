/// JWT Token Issuance and Validation
///
/// `TokenService` owns the signing key, the token lifetimes and the clock, and
/// is the only place tokens are minted or checked. Refresh-token validation
/// additionally consults the revocation store.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::claims::{Claims, TokenType};
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::RevocationStore;
use crate::user::User;

/// Access/refresh pair returned by login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    issuer: String,
    clock: Arc<dyn Clock>,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(
        config: &JwtSettings,
        clock: Arc<dyn Clock>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock, not the wall clock
        validation.validate_exp = false;
        validation.set_issuer(&[&config.issuer]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
            clock,
            revocations,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        &self.revocations
    }

    /// Mint an access token and a refresh token for a verified user
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = self.clock.now();
        let refresh = Claims::new(
            TokenType::Refresh,
            user.id,
            now,
            self.refresh_token_expiry,
            self.issuer.clone(),
        );

        Ok(TokenPair {
            access: self.issue_access(user.id)?,
            refresh: self.sign(&refresh)?,
        })
    }

    /// Mint a fresh access token for `user_id`
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue_access(&self, user_id: i64) -> Result<String, AppError> {
        let claims = Claims::new(
            TokenType::Access,
            user_id,
            self.clock.now(),
            self.access_token_expiry,
            self.issuer.clone(),
        );
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Check signature, issuer, token class and expiry
    ///
    /// Does not consult the revocation store.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature => {
                        tracing::warn!(token_type = %expected, "JWT signature mismatch")
                    }
                    _ => tracing::debug!(token_type = %expected, "JWT decode error: {}", e),
                }
                AuthError::TokenInvalid(expected)
            })?;

        if claims.token_type != expected {
            tracing::debug!(
                expected = %expected,
                presented = %claims.token_type,
                "Token class mismatch"
            );
            return Err(AuthError::TokenInvalid(expected));
        }

        if claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::TokenExpired(expected));
        }

        Ok(claims)
    }

    /// Validate a bearer access token
    pub fn validate_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode(token, TokenType::Access)
    }

    /// Validate a token of the expected class
    ///
    /// Refresh tokens are additionally checked against the revocation store,
    /// after expiry: an expired token is reported as expired even if revoked.
    ///
    /// # Errors
    /// `TokenInvalid`, `TokenExpired`, `TokenRevoked`, or a store failure
    pub async fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let claims = self.decode(token, expected)?;

        if expected == TokenType::Refresh && self.revocations.is_revoked(&claims.jti).await? {
            tracing::warn!(user_id = claims.user_id, jti = %claims.jti, "Attempt to use revoked refresh token");
            return Err(AuthError::TokenRevoked.into());
        }

        Ok(claims)
    }
}
