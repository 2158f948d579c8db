//! Configuration management for sync-tray Agent

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the sync agent listens
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Control request behaviour
    #[serde(default)]
    pub control: ControlConfig,

    /// Notification display
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Request/reply control endpoint
    #[serde(default = "default_control_endpoint")]
    pub control: String,

    /// Publish/subscribe notification endpoint
    #[serde(default = "default_notification_endpoint")]
    pub notifications: String,

    /// Topic filter for the notification subscription
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Ports file written by the sync agent. When present its ports
    /// override the ports of the endpoints above.
    #[serde(default)]
    pub ports_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Give up on a control request after this many milliseconds (0 = wait forever)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Re-query the remote state every N seconds (0 = only on demand)
    #[serde(default)]
    pub status_poll_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Title shown above every forwarded notification
    #[serde(default = "default_notification_title")]
    pub title: String,
}

// Default value functions
fn default_control_endpoint() -> String {
    "tcp://127.0.0.1:5557".to_string()
}

fn default_notification_endpoint() -> String {
    "tcp://127.0.0.1:5556".to_string()
}

fn default_topic() -> String {
    "sync".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_notification_title() -> String {
    "Sync Message".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            control: default_control_endpoint(),
            notifications: default_notification_endpoint(),
            topic: default_topic(),
            ports_file: None,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            status_poll_secs: 0,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
        }
    }
}

impl ControlConfig {
    /// Request timeout, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Status polling period, `None` when disabled
    pub fn status_poll_interval(&self) -> Option<Duration> {
        (self.status_poll_secs > 0).then(|| Duration::from_secs(self.status_poll_secs))
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("io", "sync-tray", "agent")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Apply the ports file, if one is configured and readable.
    ///
    /// A missing or unreadable ports file leaves the endpoints untouched.
    pub fn resolve_endpoints(&mut self) {
        let Some(path) = self.endpoints.ports_file.clone() else {
            return;
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Ports file {:?} not readable, keeping configured endpoints: {}", path, e);
                return;
            }
        };

        let ports = PortsFile::parse(&contents);

        if let Some(port) = ports.command_socket {
            self.endpoints.control = with_port(&self.endpoints.control, port);
        }
        if let Some(port) = ports.pub_socket {
            self.endpoints.notifications = with_port(&self.endpoints.notifications, port);
        }

        info!(
            "Endpoints from ports file {:?}: control={} notifications={}",
            path, self.endpoints.control, self.endpoints.notifications
        );
    }
}

/// Ports advertised by the sync agent.
///
/// The file starts with a free-form header line followed by
/// `name:port` lines, e.g. `command_socket:5557`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortsFile {
    pub command_socket: Option<u16>,
    pub pub_socket: Option<u16>,
}

impl PortsFile {
    pub fn parse(contents: &str) -> Self {
        let mut ports = PortsFile::default();

        for line in contents.lines() {
            let Some((name, port)) = line.trim().split_once(':') else {
                continue;
            };
            let Ok(port) = port.trim().parse::<u16>() else {
                debug!("Ignoring ports file line {:?}", line);
                continue;
            };

            // Later entries win
            match name.trim() {
                "command_socket" => ports.command_socket = Some(port),
                "pub_socket" => ports.pub_socket = Some(port),
                _ => {}
            }
        }

        ports
    }
}

/// Replace the port of a `scheme://host:port` endpoint
fn with_port(endpoint: &str, port: u16) -> String {
    let (prefix, address) = match endpoint.split_once("://") {
        Some((scheme, address)) => (format!("{}://", scheme), address),
        None => (String::new(), endpoint),
    };

    let host = match address.rsplit_once(':') {
        Some((host, _)) => host,
        None => address,
    };

    format!("{}{}:{}", prefix, host, port)
}
