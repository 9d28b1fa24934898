//! Process configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use crate::auth::AdminAuth;
use crate::keeper::DEFAULT_RETRY_DELAY;
use crate::schedule::WindowSchedule;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no database configured: set DATABASE_URL or DB_HOST and DB")]
    MissingDatabase,
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub from: String,
    pub event_name: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: String,
    pub db_retry_delay: Duration,
    pub mail: Option<MailSettings>,
    pub schedule: WindowSchedule,
    pub admin: AdminAuth,
    pub static_dir: Option<PathBuf>,
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let (host, db) = get("DB_HOST").zip(get("DB")).ok_or(ConfigError::MissingDatabase)?;
                let port: u16 = parse_number("DB_PORT", get("DB_PORT"), 5432)?;
                let auth = match (get("DB_USER"), get("DB_PASSWD")) {
                    (Some(user), Some(password)) => format!("{}:{}@", user, password),
                    (Some(user), None) => format!("{}@", user),
                    _ => String::new(),
                };
                format!("postgres://{}{}:{}/{}", auth, host, port, db)
            }
        };

        let mail = match get("MAIL_SERVER") {
            Some(host) => Some(MailSettings {
                host,
                port: parse_number("MAIL_PORT", get("MAIL_PORT"), 25)?,
                credentials: get("MAIL_USER").zip(get("MAIL_PASSWD")),
                from: get("MAIL_FROM").unwrap_or_else(|| "No reply <no-reply@localhost>".to_string()),
                event_name: get("EVENT_NAME").unwrap_or_else(|| "Event".to_string()),
            }),
            None => None,
        };

        let schedule = WindowSchedule::from_raw(
            get("ENABLE_GUEST").as_deref(),
            get("ENABLE_OTHER").as_deref(),
            get("DISABLE_SIGN_UP").as_deref(),
        );

        let bypass_requested = get("DEV_AUTH_BYPASS").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let bypass = bypass_requested && cfg!(debug_assertions);
        if bypass_requested && !bypass {
            warn!("DEV_AUTH_BYPASS is ignored in release builds");
        }
        let admin = AdminAuth::new(get("DATA_USER").zip(get("DATA_PASSWD")), bypass);

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_number("PORT", get("PORT"), 8080)?,
            database_url,
            db_retry_delay: Duration::from_secs(parse_number(
                "DB_RETRY_SECS",
                get("DB_RETRY_SECS"),
                DEFAULT_RETRY_DELAY.as_secs(),
            )?),
            mail,
            schedule,
            admin,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
        })
    }
}
