/// Authentication Routes
///
/// Login, token refresh, logout and current-user lookup under `/auth/`.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Claims, LogoutOutcome, SessionService};
use crate::error::{AppError, ErrorContext, ValidationError};

const MAX_USERNAME_LENGTH: usize = 254;
const MAX_PASSWORD_LENGTH: usize = 4096;

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// Logout request. A `refresh` value that is not a string is accepted and
/// ignored rather than failing body extraction.
#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh: Option<RefreshField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum RefreshField {
    Token(String),
    Other(serde::de::IgnoredAny),
}

/// Response to a successful refresh
#[derive(Serialize)]
pub struct AccessResponse {
    pub access: String,
}

#[derive(Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

/// Presence, blank and length checks for a required string field.
/// Callers trim the value first where surrounding whitespace is insignificant.
fn required_field<'a>(
    field: &str,
    value: Option<&'a str>,
    max_length: usize,
) -> Result<&'a str, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(field.to_string())),
        Some("") => Err(ValidationError::BlankField(field.to_string())),
        Some(v) if v.chars().count() > max_length => {
            Err(ValidationError::TooLong(field.to_string(), max_length))
        }
        Some(v) => Ok(v),
    }
}

/// POST /auth/login/
///
/// Authenticate with a username (or email) and password.
/// Returns an access token and a refresh token on success.
/// The username is trimmed; the password is taken verbatim.
///
/// # Errors
/// - 400: Missing or blank fields
/// - 401: Invalid credentials (unknown user, wrong password and inactive
///   account all produce the same response)
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_login");

    let username = required_field(
        "username",
        form.username.as_deref().map(str::trim),
        MAX_USERNAME_LENGTH,
    )?;
    let password = required_field("password", form.password.as_deref(), MAX_PASSWORD_LENGTH)?;

    let pair = session
        .login(username, password)
        .await
        .map_err(|e| context.fail(e))?;

    tracing::info!(request_id = %context.request_id, "Login succeeded");
    Ok(HttpResponse::Ok().json(pair))
}

/// POST /auth/refresh/
///
/// Exchange a refresh token for a new access token. The refresh token itself
/// is not rotated.
///
/// # Errors
/// - 400: Missing refresh token
/// - 401: Invalid, expired or blacklisted refresh token, or owner no longer active
pub async fn refresh(
    req: HttpRequest,
    form: web::Json<RefreshRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "token_refresh");

    let refresh = required_field(
        "refresh",
        form.refresh.as_deref().map(str::trim),
        usize::MAX,
    )?;

    let access = session
        .refresh(refresh)
        .await
        .map_err(|e| context.fail(e))?;

    Ok(HttpResponse::Ok().json(AccessResponse { access }))
}

/// POST /auth/logout/
///
/// Blacklist the given refresh token. **Requires a valid access token.**
/// Succeeds for tokens that are already blacklisted or unusable, including
/// a `refresh` value that is not a string at all.
///
/// # Errors
/// - 400: Missing or empty refresh token
/// - 401: Missing or invalid access token (handled by middleware)
pub async fn logout(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    form: web::Json<LogoutRequest>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_logout").with_user_id(claims.user_id);

    let outcome = match &form.refresh {
        None => return Err(ValidationError::RefreshTokenRequired.into()),
        Some(RefreshField::Token(token)) if token.is_empty() => {
            return Err(ValidationError::RefreshTokenRequired.into())
        }
        Some(RefreshField::Token(token)) => session
            .logout(token)
            .await
            .map_err(|e| context.fail(e))?,
        Some(RefreshField::Other(_)) => LogoutOutcome::Ignored,
    };

    tracing::info!(
        request_id = %context.request_id,
        user_id = claims.user_id,
        ?outcome,
        "Logout processed"
    );

    Ok(HttpResponse::Ok().json(DetailResponse {
        detail: "Logged out successfully.",
    }))
}

/// GET /auth/me/
///
/// Profile of the authenticated user.
/// **Requires valid JWT access token** in Authorization header.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware), or the user
///   behind the token is gone or inactive
pub async fn get_current_user(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    session: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "current_user").with_user_id(claims.user_id);

    let user = session
        .current_user(&claims)
        .await
        .map_err(|e| context.fail(e))?;

    Ok(HttpResponse::Ok().json(user.profile()))
}
