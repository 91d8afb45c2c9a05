use std::env;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("You need to add {0} to the env")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process settings, read from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub mongodb_uri: String,
    pub database: String,
    pub bind_address: String,
    pub port: u16,
    pub bot_token: String,
    pub json_logs: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => 8080,
        };

        Ok(Settings {
            mongodb_uri: required("MONGODB_URI")?,
            database: lookup("MONGODB_DATABASE").unwrap_or_else(|| "OpenSplit".to_string()),
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            bot_token: required("BOT_API_TOKEN")?,
            json_logs: lookup("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json")),
        })
    }
}
