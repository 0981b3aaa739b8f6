/// Error Handling Module
///
/// One unified error type for the whole service:
/// 1. Domain-specific error enums (validation, database, config, auth)
/// 2. `AppError`, the type every fallible operation returns
/// 3. HTTP response mapping with structured logging
/// 4. Per-request error context
///
/// Response bodies never contain per-request data, so two equivalent failures
/// (e.g. unknown user vs. wrong password) produce byte-identical bodies. The
/// request id travels in the `x-request-id` header, set by `LoggerMiddleware`.

use actix_web::{error::ResponseError, http::StatusCode, HttpMessage, HttpRequest, HttpResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use crate::auth::TokenType;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id assigned to a request by `LoggerMiddleware`, stored in its extensions
#[derive(Debug, Clone, PartialEq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ============================================================================
// 1. DOMAIN-SPECIFIC ERROR TYPES
// ============================================================================

/// Request payload errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingField(String),
    BlankField(String),
    TooLong(String, usize),
    MalformedBody(String),
    RefreshTokenRequired,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(field) => write!(f, "{} is missing", field),
            ValidationError::BlankField(field) => write!(f, "{} is blank", field),
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::MalformedBody(reason) => write!(f, "JSON parse error - {}", reason),
            ValidationError::RefreshTokenRequired => write!(f, "Refresh token is required."),
        }
    }
}

impl StdError for ValidationError {}

/// Storage errors
#[derive(Debug)]
pub enum DatabaseError {
    ConnectionPool(String),
    QueryExecution(String),
    CorruptRecord(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::CorruptRecord(msg) => write!(f, "Corrupt record: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Authentication and token lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown user, wrong password or inactive account; deliberately indistinguishable
    InvalidCredentials,
    /// No usable bearer credentials on a protected route
    NotAuthenticated,
    /// Malformed, badly signed, wrong issuer or wrong token class
    TokenInvalid(TokenType),
    /// Well-formed and correctly signed but past `exp`
    TokenExpired(TokenType),
    /// Refresh token present in the revocation store
    TokenRevoked,
    /// Refresh token whose owner no longer exists or is inactive
    NoActiveAccount,
    UserNotFound,
    UserInactive,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => {
                write!(f, "No active account found with the given credentials")
            }
            AuthError::NotAuthenticated => {
                write!(f, "Authentication credentials were not provided.")
            }
            AuthError::TokenInvalid(_) => write!(f, "Token is invalid"),
            AuthError::TokenExpired(_) => write!(f, "Token is expired"),
            AuthError::TokenRevoked => write!(f, "Token is blacklisted"),
            AuthError::NoActiveAccount => write!(f, "No active account found for the given token."),
            AuthError::UserNotFound => write!(f, "User not found"),
            AuthError::UserInactive => write!(f, "User is inactive"),
        }
    }
}

impl StdError for AuthError {}

// ============================================================================
// 2. UNIFIED APPLICATION ERROR TYPE
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    /// The auth error behind this error, if any
    pub fn as_auth(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(e) => Some(*e),
            _ => None,
        }
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                AppError::Database(DatabaseError::CorruptRecord(err.to_string()))
            }
            _ => AppError::Database(DatabaseError::QueryExecution(err.to_string())),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Per-token detail attached to access-token failures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenMessage {
    pub token_class: &'static str,
    pub token_type: &'static str,
    pub message: String,
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Detail {
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<&'static str>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        messages: Vec<TokenMessage>,
    },
    Fields(BTreeMap<String, Vec<String>>),
}

impl ErrorBody {
    pub fn detail(detail: impl Into<String>) -> Self {
        ErrorBody::Detail {
            detail: detail.into(),
            code: None,
            messages: Vec::new(),
        }
    }

    pub fn coded(detail: impl Into<String>, code: &'static str) -> Self {
        ErrorBody::Detail {
            detail: detail.into(),
            code: Some(code),
            messages: Vec::new(),
        }
    }

    fn field(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        ErrorBody::Fields(fields)
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self) -> (StatusCode, ErrorBody);
    /// Emitted inside the request span, which carries the request id
    fn log_error(&self);
}

fn auth_error_body(e: &AuthError) -> ErrorBody {
    match e {
        AuthError::InvalidCredentials | AuthError::NoActiveAccount => {
            ErrorBody::coded(e.to_string(), "no_active_account")
        }
        AuthError::NotAuthenticated => ErrorBody::detail(e.to_string()),
        // Access tokens are rejected by the bearer authenticator, which reports
        // the failure per token class; refresh failures carry a flat detail.
        AuthError::TokenInvalid(TokenType::Access) | AuthError::TokenExpired(TokenType::Access) => {
            ErrorBody::Detail {
                detail: "Given token not valid for any token type".to_string(),
                code: Some("token_not_valid"),
                messages: vec![TokenMessage {
                    token_class: TokenType::Access.class_name(),
                    token_type: TokenType::Access.as_str(),
                    message: e.to_string(),
                }],
            }
        }
        AuthError::TokenInvalid(TokenType::Refresh)
        | AuthError::TokenExpired(TokenType::Refresh)
        | AuthError::TokenRevoked => ErrorBody::coded(e.to_string(), "token_not_valid"),
        AuthError::UserNotFound => ErrorBody::coded(e.to_string(), "user_not_found"),
        AuthError::UserInactive => ErrorBody::coded(e.to_string(), "user_inactive"),
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(e) => {
                let body = match e {
                    ValidationError::MissingField(field) => {
                        ErrorBody::field(field, "This field is required.")
                    }
                    ValidationError::BlankField(field) => {
                        ErrorBody::field(field, "This field may not be blank.")
                    }
                    ValidationError::TooLong(field, max) => ErrorBody::field(
                        field,
                        &format!("Ensure this field has no more than {} characters.", max),
                    ),
                    ValidationError::MalformedBody(_) | ValidationError::RefreshTokenRequired => {
                        ErrorBody::detail(e.to_string())
                    }
                };
                (StatusCode::BAD_REQUEST, body)
            }

            AppError::Auth(e) => (StatusCode::UNAUTHORIZED, auth_error_body(e)),

            AppError::Database(DatabaseError::ConnectionPool(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::detail("Database service temporarily unavailable"),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::detail("Database error occurred"),
            ),

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::detail("Server configuration error"),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::detail("Internal server error"),
            ),
        }
    }

    fn log_error(&self) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "Validation error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(error = %self, "Invalid credentials attempt");
            }
            AppError::Auth(AuthError::TokenRevoked) => {
                tracing::warn!(error = %self, "Blacklisted token presented");
            }
            AppError::Auth(e) => {
                tracing::info!(error = %e, "Authentication error");
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
            }
            AppError::Config(e) => {
                tracing::error!(error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.log_error();

        let (status, body) = <Self as ErrorHandler>::error_response(self);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        <Self as ErrorHandler>::error_response(self).0
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context for handler logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<i64>,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
        }
    }

    /// Context sharing the id `LoggerMiddleware` assigned to `req`
    pub fn for_request(req: &HttpRequest, operation: impl Into<String>) -> Self {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::generate);

        Self {
            request_id: request_id.0,
            user_id: None,
            operation: operation.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Log a failed operation with the context attached, then hand the error back
    pub fn fail(&self, error: AppError) -> AppError {
        tracing::debug!(
            request_id = %self.request_id,
            operation = %self.operation,
            user_id = ?self.user_id,
            error = %error,
            "Operation failed"
        );
        error
    }
}
