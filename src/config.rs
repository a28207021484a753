use std::env;
use std::fmt::Display;
use std::str::FromStr;

use derive_more::Display;
use log::info;

use crate::models::IdType;

#[derive(Debug, Display, PartialEq)]
pub enum ConfigError {
    #[display(fmt = "{} must be set", _0)]
    Missing(String),

    #[display(fmt = "Invalid {} value: {}", _0, _1)]
    Invalid(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub cookie_secret_key: String,
    pub password_secret_key: String,
    pub root_default_password: String,
    pub root_password_override: bool,
    pub domain: String,
    pub bind_address: String,
    /// Contact id of the organization running the platform.
    pub fietsberaad_contact_id: IdType,
    pub report_max_days: i64,
    pub cache_refresh_interval_minutes: Option<u64>,
    pub cache_refresh_window_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            cookie_secret_key: required("COOKIE_SECRET_KEY")?,
            password_secret_key: required("PASSWORD_SECRET_KEY")?,
            root_default_password: required("ROOT_DEFAULT_PASSWORD")?,
            root_password_override: lookup("ROOT_PASSWORD_OVERRIDE").map(|x| !x.is_empty()).unwrap_or(false),
            domain: lookup("DOMAIN").unwrap_or_else(|| "localhost".to_string()),
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            fietsberaad_contact_id: parse_or(&lookup, "FIETSBERAAD_CONTACT_ID", 1)?,
            report_max_days: parse_or(&lookup, "REPORT_MAX_DAYS", 3700)?,
            cache_refresh_interval_minutes: match lookup("CACHE_REFRESH_INTERVAL_MINUTES") {
                Some(ref x) if !x.is_empty() => Some(parse_value("CACHE_REFRESH_INTERVAL_MINUTES", x)?),
                _ => None,
            },
            cache_refresh_window_days: parse_or(&lookup, "CACHE_REFRESH_WINDOW_DAYS", 7)?,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
    where T::Err: Display
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid(key.to_string(), e.to_string()))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
    where T: FromStr + Display,
          T::Err: Display,
          F: Fn(&str) -> Option<String>
{
    match lookup(key) {
        Some(value) => parse_value(key, &value),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
