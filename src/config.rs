//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default number of prior messages after which a sender counts as frequent.
pub const DEFAULT_FREQUENT_THRESHOLD: u32 = 3;

const DEFAULT_SMTP_PORT: u16 = 587;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Prior-message count at which the frequent-sender template applies.
    pub frequent_threshold: u32,
    /// Maximum messages processed concurrently by a batch run.
    pub max_concurrent: usize,
    /// Upper bound for a single message's pipeline run.
    pub process_timeout: Duration,
    /// Optional directory of `<key>.txt` files overriding stored templates.
    pub templates_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/tone-responder.db"),
            frequent_threshold: DEFAULT_FREQUENT_THRESHOLD,
            max_concurrent: 4,
            process_timeout: Duration::from_secs(30),
            templates_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Unset variables use the default; set-but-unparseable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("TONE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let frequent_threshold =
            parse_env("TONE_FREQUENT_THRESHOLD")?.unwrap_or(defaults.frequent_threshold);

        let max_concurrent: usize =
            parse_env("TONE_MAX_CONCURRENT")?.unwrap_or(defaults.max_concurrent);
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TONE_MAX_CONCURRENT".into(),
                message: "must be at least 1".into(),
            });
        }

        let process_timeout = parse_env::<u64>("TONE_PROCESS_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.process_timeout);

        let templates_dir = std::env::var("TONE_TEMPLATES_DIR").ok().map(PathBuf::from);

        Ok(Self {
            db_path,
            frequent_threshold,
            max_concurrent,
            process_timeout,
            templates_dir,
        })
    }
}

/// Outbound SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl SmtpConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SMTP_HOST` is not set (replies are only logged).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };

        let port = parse_env("SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT);
        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Ok(Some(Self {
            host,
            port,
            username,
            password,
            from_address,
        }))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
