//! Connector configuration parsed from environment variables.

use crate::connector::{DEFAULT_PORT, Role};
use crate::error::ErrorCode;

pub const ROLE_VAR: &str = "SCENESYNC_ROLE";
pub const HOST_VAR: &str = "SCENESYNC_HOST";
pub const PORT_VAR: &str = "SCENESYNC_PORT";
pub const NAME_VAR: &str = "SCENESYNC_NAME";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_SESSION_NAME: &str = "Collaboration";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown {ROLE_VAR}: {0} (expected 'server' or 'client')")]
    UnknownRole(String),
    #[error("invalid {PORT_VAR}: {0}")]
    InvalidPort(String),
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownRole(_) => "E_CONFIG_ROLE",
            Self::InvalidPort(_) => "E_CONFIG_PORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    pub role: Role,
    /// Session name; also the prefix of the local chat object.
    pub name: String,
}

impl ConnectorConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `SCENESYNC_ROLE`: `server` (default) or `client`
    /// - `SCENESYNC_HOST`: host a client connects to, default `127.0.0.1`
    /// - `SCENESYNC_PORT`: default 18944
    /// - `SCENESYNC_NAME`: default `Collaboration`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown role or an unparsable port.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup, e.g. parsed flags layered over the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown role or an unparsable port.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup(PORT_VAR) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let role = match lookup(ROLE_VAR).as_deref().map(str::trim).unwrap_or("server") {
            "server" => Role::Server { port },
            "client" => {
                let host = lookup(HOST_VAR).unwrap_or_else(|| DEFAULT_HOST.to_owned());
                Role::Client { host, port }
            }
            other => return Err(ConfigError::UnknownRole(other.to_owned())),
        };
        let name = lookup(NAME_VAR)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_owned());
        Ok(Self { role, name })
    }

    /// Name of the local chat object. Carries the role so two instances
    /// with the same session name do not overwrite each other's lines.
    #[must_use]
    pub fn chat_name(&self) -> String {
        match self.role {
            Role::Server { .. } => format!("{}-server", self.name),
            Role::Client { .. } => format!("{}-client", self.name),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
