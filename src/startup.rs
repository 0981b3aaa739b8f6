use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, middleware::Logger, web, App, HttpRequest, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{CredentialVerifier, SessionService, TokenService};
use crate::clock::Clock;
use crate::configuration::Settings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{get_current_user, health_check, login, logout, refresh};
use crate::store::{RevocationStore, UserStore};

/// Wire the session facade from settings and its injected dependencies
///
/// # Errors
/// Returns error if the configured bcrypt cost is unusable
pub fn build_session_service(
    settings: &Settings,
    users: Arc<dyn UserStore>,
    revocations: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
) -> Result<SessionService, AppError> {
    let verifier = CredentialVerifier::new(users.clone(), settings.password.bcrypt_cost)?;
    let tokens = TokenService::new(&settings.jwt, clock, revocations);
    Ok(SessionService::new(users, verifier, tokens))
}

/// Periodically drop blacklist entries whose tokens have expired anyway
pub fn spawn_revocation_purge(
    revocations: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match revocations.purge_expired(clock.now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired blacklist entries"),
                Err(e) => tracing::error!(error = %e, "Blacklist purge failed"),
            }
        }
    })
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::from(ValidationError::MalformedBody(err.to_string())).into()
}

pub fn run(
    listener: TcpListener,
    session: SessionService,
) -> Result<Server, std::io::Error> {
    let session = web::Data::new(session);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(session.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))

            .service(
                web::resource(["/health_check", "/health/"]).route(web::get().to(health_check)),
            )
            .service(
                web::scope("/auth")
                    // Public routes
                    .service(web::resource(["/login/", "/login"]).route(web::post().to(login)))
                    .service(web::resource(["/refresh/", "/refresh"]).route(web::post().to(refresh)))

                    // Protected routes (require a bearer access token)
                    .service(
                        web::resource(["/logout/", "/logout"])
                            .wrap(JwtMiddleware::new(session.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource(["/me/", "/me"])
                            .wrap(JwtMiddleware::new(session.clone()))
                            .route(web::get().to(get_current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
