/// User records as seen by the authentication service
///
/// Users are created and administered elsewhere; this service only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access-control role attached to every user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Consultant,
    Manager,
    Finance,
    Director,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consultant => "consultant",
            Role::Manager => "manager",
            Role::Finance => "finance",
            Role::Director => "director",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consultant" => Ok(Role::Consultant),
            "manager" => Ok(Role::Manager),
            "finance" => Ok(Role::Finance),
            "director" => Ok(Role::Director),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Stored user record
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_manager: bool,
    pub role: Role,
    pub is_active: bool,
    /// bcrypt hash; never leaves the service
    pub password_hash: String,
}

impl User {
    /// Whether this account may log in or hold a session
    pub fn can_authenticate(&self) -> bool {
        self.is_active
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            is_manager: self.is_manager,
            role: self.role,
        }
    }
}

/// Public profile returned by `GET /auth/me/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_manager: bool,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            username: "john_doe".to_string(),
            email: "john@example.com".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            is_manager: true,
            role: Role::Manager,
            is_active: true,
            password_hash: "$2b$04$notarealhash".to_string(),
        }
    }

    #[test]
    fn test_profile_omits_password_material() {
        let json = serde_json::to_value(sample_user().profile()).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["username"], "john_doe");
        assert_eq!(json["is_manager"], true);
        assert_eq!(json["role"], "manager");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("is_active").is_none());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("director".parse::<Role>().unwrap(), Role::Director);
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Consultant);
    }

    #[test]
    fn test_inactive_user_cannot_authenticate() {
        let mut user = sample_user();
        assert!(user.can_authenticate());
        user.is_active = false;
        assert!(!user.can_authenticate());
    }
}
