use anyhow::Context;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "STOMPD_CONFIG";
/// Environment variable overriding the listening port.
pub const PORT_ENV: &str = "STOMPD_PORT";

pub const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> anyhow::Result<tracing::Level> {
        self.level
            .parse()
            .with_context(|| format!("invalid log level '{}'", self.level))
    }
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads the config file named by `STOMPD_CONFIG` (if set) and applies
    /// the `STOMPD_PORT` override (if set).
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let port = std::env::var(PORT_ENV).ok();
        Self::resolve(path.as_deref(), port.as_deref())
    }

    /// Builds a config from an optional file plus an optional port override.
    pub fn resolve(path: Option<&Path>, port: Option<&str>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        if let Some(port) = port {
            cfg.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid {} value '{}'", PORT_ENV, port))?;
        }

        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(contents)?;
        cfg.logging.max_level()?;
        Ok(cfg)
    }
}
