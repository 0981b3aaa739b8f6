/// Credential verification
///
/// Accepts a username or an email address as the login identifier. Every
/// failure collapses into `AuthError::InvalidCredentials` so callers cannot
/// tell an unknown user from a wrong password.

use std::sync::Arc;

use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AuthError};
use crate::store::UserStore;
use crate::user::User;

pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    /// Checked against when the identifier matches nobody, so both paths pay for one bcrypt run
    dummy_hash: String,
}

impl CredentialVerifier {
    /// # Errors
    /// Returns error if the bcrypt cost is invalid
    pub fn new(users: Arc<dyn UserStore>, bcrypt_cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash_password(&uuid::Uuid::new_v4().to_string(), bcrypt_cost)?;
        Ok(Self { users, dummy_hash })
    }

    /// Look up the user behind `identifier` and check `password`
    ///
    /// # Errors
    /// `InvalidCredentials` on any mismatch; store errors pass through
    pub async fn verify(&self, identifier: &str, password: &str) -> Result<User, AppError> {
        let user = self.lookup(identifier).await?;

        let Some(user) = user else {
            verify_password(password, &self.dummy_hash);
            return Err(AuthError::InvalidCredentials.into());
        };

        if verify_password(password, &user.password_hash) && user.can_authenticate() {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials.into())
        }
    }

    /// Resolve the identifier; when it matches several accounts (one by
    /// username, another by email), only an exact username match counts.
    async fn lookup(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let mut matches = self.users.find_by_login(identifier).await?;

        if matches.len() <= 1 {
            return Ok(matches.pop());
        }

        let wanted = identifier.to_lowercase();
        Ok(matches
            .into_iter()
            .find(|u| u.username.to_lowercase() == wanted))
    }
}
