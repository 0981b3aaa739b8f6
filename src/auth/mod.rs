/// Authentication module
///
/// Handles credential verification, JWT issuance/validation and the
/// login/refresh/logout/me session lifecycle.

mod claims;
mod credentials;
mod jwt;
mod password;
mod session;

pub use claims::{Claims, TokenType};
pub use credentials::CredentialVerifier;
pub use jwt::{TokenPair, TokenService};
pub use password::{hash_password, verify_password};
pub use session::{LogoutOutcome, SessionService};
