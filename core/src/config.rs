//! Where the server under test lives.
//!
//! # Design
//! `TargetConfig` reads `TARGET_HOST`, `TARGET_PORT`, `TARGET_HTTPS` and
//! `TARGET_VERBOSE`, falling back to `localhost:8080` over plain HTTP with
//! logging off. `from_lookup` takes the lookup function so tests never touch
//! the process environment.

use std::env;

use serde::Serialize;

use crate::client::RequestClient;
use crate::error::{ConfigError, RequestError};
use crate::http::{HttpMethod, RequestOptions};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    pub use_https: bool,
    pub verbose: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            use_https: false,
            verbose: false,
        }
    }
}

impl TargetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("TARGET_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("TARGET_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value })?,
            None => DEFAULT_PORT,
        };
        let use_https = parse_bool("TARGET_HTTPS", lookup("TARGET_HTTPS"))?;
        let verbose = parse_bool("TARGET_VERBOSE", lookup("TARGET_VERBOSE"))?;
        Ok(Self {
            host,
            port,
            use_https,
            verbose,
        })
    }

    pub fn options(&self, path: &str, method: HttpMethod) -> RequestOptions {
        RequestOptions::new(&self.host, self.port, path, method)
            .with_https(self.use_https)
            .with_verbose(self.verbose)
    }
}

fn parse_bool(key: &str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value,
        }),
    }
}

/// A server under test plus the client used to reach it.
#[derive(Debug, Clone)]
pub struct Target {
    config: TargetConfig,
    client: RequestClient,
}

impl Target {
    pub fn new(config: TargetConfig, client: RequestClient) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, data: &T) -> Result<(), RequestError> {
        let options = self.config.options(path, HttpMethod::Post);
        self.client.send(&options, Some(data)).await
    }

    pub async fn get(&self, path: &str) -> Result<(), RequestError> {
        let options = self.config.options(path, HttpMethod::Get);
        self.client.send::<()>(&options, None).await
    }
}
