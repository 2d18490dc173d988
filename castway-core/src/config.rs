use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::{CastwayError, Result};

pub const DEFAULT_PORT: u16 = 8009;
pub const DEFAULT_HOST: &str = "localhost";

/// Environment overlay applied when spawning the external server process.
///
/// Values pass through to the child unvalidated, except that a port read
/// from the environment must at least parse as one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LaunchConfig {
    pub port: u16,
    pub host: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
        }
    }
}

impl LaunchConfig {
    pub fn new(port: u16, host: impl Into<String>) -> Self {
        Self {
            port,
            host: host.into(),
        }
    }

    /// Build a configuration from the `PORT` and `HOST` environment
    /// variables, falling back to the defaults when unset.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => parse_port(&raw)?,
            Err(_) => DEFAULT_PORT,
        };
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Ok(Self { port, host })
    }

    /// The override pairs applied on top of the inherited parent
    /// environment. Overrides take precedence over inherited values.
    pub fn env_overlay(&self) -> Vec<(String, String)> {
        vec![
            ("PORT".to_string(), self.port.to_string()),
            ("HOST".to_string(), self.host.clone()),
        ]
    }
}

/// Parse a port value taken from the environment or a manifest.
pub fn parse_port(raw: &str) -> Result<u16> {
    raw.parse::<u16>().map_err(|_| {
        CastwayError::InvalidConfiguration(format!(
            "port must be a number between 1 and 65535, got '{}'",
            raw
        ))
    })
}

/// Relaunch behavior after the server process exits on its own.
///
/// Disabled by default: the supervisor then propagates the first exit
/// straight through. An exit after at least `min_uptime_secs` of uptime
/// resets the consecutive-restart counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RestartPolicy {
    pub autorestart: bool,
    pub max_restarts: u32,
    pub min_uptime_secs: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            autorestart: false,
            max_restarts: 10,
            min_uptime_secs: 10,
        }
    }
}

impl RestartPolicy {
    pub fn min_uptime(&self) -> Duration {
        Duration::from_secs(self.min_uptime_secs)
    }
}

/// Grace period between the forwarded shutdown signal and a forced kill.
///
/// `None` forwards a single signal and waits indefinitely for the child.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShutdownPolicy {
    pub kill_timeout_secs: Option<u64>,
}

impl ShutdownPolicy {
    pub fn kill_timeout(&self) -> Option<Duration> {
        self.kill_timeout_secs.map(Duration::from_secs)
    }
}

/// Declarative launch manifest (TOML), the file form of everything the
/// supervisor accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Manifest {
    pub server: LaunchConfig,
    pub restart: RestartPolicy,
    pub shutdown: ShutdownPolicy,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CastwayError::InvalidConfiguration(format!("invalid manifest: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }
}
