use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Lifetimes (seconds) and bootstrap settings of the authorization engines.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    /// User and client assertions (JWT)
    pub session_lifetime: i64,
    pub authorization_code_lifetime: i64,
    pub access_token_lifetime: i64,
    pub refresh_token_lifetime: i64,
    /// Unverified sign-ups
    pub pending_lifetime: i64,
    /// Client leases
    pub client_lifetime: i64,
    /// Interval of the best-effort purge task
    pub housekeeping_interval: u64,
    /// Accounts verified with one of these addresses receive every
    /// administrative realm.
    pub admin_emails: Vec<String>,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            session_lifetime: 20 * 60,
            authorization_code_lifetime: 10 * 60,
            access_token_lifetime: 20 * 60,
            refresh_token_lifetime: 5_256_000,
            pending_lifetime: 10 * 60,
            client_lifetime: 7_890_000,
            housekeeping_interval: 300,
            admin_emails: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Postgres/SQLite URL, or `memory` for a process-local store.
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Base URL used in verification links.
    pub public_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub oauth2: OAuth2Config,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "jwt_secret must be at least 32 bytes".into(),
            ));
        }
        if let Some(smtp) = &self.smtp
            && smtp.port == 0
        {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_ms must be > 0".into(),
            ));
        }
        let o = &self.oauth2;
        let lifetimes = [
            ("session_lifetime", o.session_lifetime),
            ("authorization_code_lifetime", o.authorization_code_lifetime),
            ("access_token_lifetime", o.access_token_lifetime),
            ("refresh_token_lifetime", o.refresh_token_lifetime),
            ("pending_lifetime", o.pending_lifetime),
            ("client_lifetime", o.client_lifetime),
        ];
        if let Some((name, _)) = lifetimes.iter().find(|(_, secs)| *secs <= 0) {
            return Err(ConfigError::Validation(format!(
                "oauth2.{name} must be > 0"
            )));
        }
        if o.housekeeping_interval == 0 {
            return Err(ConfigError::Validation(
                "oauth2.housekeeping_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `.env`, `config.yaml` and
/// environment overrides.
///
/// Environment variables use the key path separated by double underscores
/// (e.g. `OAUTH2__ACCESS_TOKEN_LIFETIME`, `SMTP__PORT`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let _ = dotenvy::dotenv();
    load_config_with(
        Config::builder()
            .add_source(File::with_name("config.yaml").required(false))
            .add_source(Environment::default().separator("__")),
    )
}

/// Deserialize and validate whatever sources `builder` carries.
pub fn load_config_with(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let app: AppConfig = builder.build()?.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
