use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use onesuite_auth::clock::{Clock, SystemClock};
use onesuite_auth::configuration::get_configuration;
use onesuite_auth::startup::{build_session_service, run, spawn_revocation_purge};
use onesuite_auth::store::{PgRevocationStore, PgUserStore, RevocationStore, UserStore};
use onesuite_auth::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = init_telemetry("info") {
        eprintln!("Failed to initialise logging: {}", e);
    }

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(startup_error(std::io::ErrorKind::InvalidInput, "Configuration error"));
        }
    };

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            startup_error(std::io::ErrorKind::Other, "Migration error")
        })?;
    tracing::info!("Database ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let revocations: Arc<dyn RevocationStore> = Arc::new(PgRevocationStore::new(pool));

    let session = build_session_service(&configuration, users, revocations.clone(), clock.clone())
        .map_err(|e| {
            tracing::error!("Failed to build session service: {}", e);
            startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
        })?;

    spawn_revocation_purge(
        revocations,
        clock,
        configuration.revocation.purge_interval_secs,
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, session)?.await
}
