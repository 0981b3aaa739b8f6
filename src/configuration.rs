use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub password: PasswordSettings,
    #[serde(default)]
    pub revocation: RevocationSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "{}/{}",
            self.connection_string_without_db(),
            self.database_name
        )
    }

    /// Server-level connection, used to create throwaway test databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64,   // seconds (900 = 15 minutes)
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64,  // seconds (604800 = 7 days)
    pub issuer: String,
}

fn default_access_expiry() -> i64 {
    15 * 60
}

fn default_refresh_expiry() -> i64 {
    7 * 24 * 60 * 60
}

const MIN_SECRET_LENGTH: usize = 32;

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token lifetimes must be positive".to_string(),
            ));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::InvalidValue("jwt.issuer is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    pub bcrypt_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct RevocationSettings {
    /// How often expired blacklist entries are purged
    pub purge_interval_secs: u64,
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            purge_interval_secs: 3600,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate()?;
        if !(4..=31).contains(&self.password.bcrypt_cost) {
            return Err(ConfigError::InvalidValue(
                "password.bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }
        if self.revocation.purge_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "revocation.purge_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `configuration.{yaml,toml,json}` from the working directory, then
/// apply `APP_<SECTION>__<KEY>` environment overrides (e.g. `APP_JWT__SECRET`).
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
