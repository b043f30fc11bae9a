//! Connection configuration.

use crate::errors::{Result, VncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Complete connection configuration, immutable once a session is up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port. For TCP this is the RFB port (5900 + display); for
    /// WebSocket it is the RFB port referenced by `${vnc_port}`.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional username. Accepted for config compatibility; RFB 3.8's
    /// None/VNC security types never transmit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for VNC authentication. On the WebSocket transport the
    /// ticket doubles as the password when the server asks for VNC auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Connect and read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Transport selection.
    #[serde(default)]
    pub transport: Transport,
}

fn default_port() -> u16 {
    5900
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// How the RFB byte stream reaches the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Direct TCP socket.
    #[default]
    Tcp,
    /// RFB tunneled as binary frames over a secure WebSocket.
    WebSocket(WebSocketConfig),
}

/// WebSocket transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// URL template with `${host}`, `${host_port}`, `${vnc_port}` and
    /// `${ticket}` placeholders.
    pub url_template: String,
    /// Port of the WebSocket endpoint itself (`${host_port}`).
    pub host_port: u16,
    /// Short-lived console ticket (`${ticket}`); also used as the VNC-auth
    /// password when the tunneled server demands one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// PEM certificate installed as an additional TLS trust root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_pem: Option<String>,
    /// Verify the server certificate and hostname. Off by necessity in
    /// self-signed deployments.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    /// Extra HTTP headers for the upgrade request (API tokens and the
    /// like).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            host_port: 0,
            ticket: None,
            certificate_pem: None,
            verify_ssl: true,
            headers: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// [`VncError::Input`] when a required value is missing or out of
    /// range.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(VncError::Input("host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(VncError::Input("port cannot be 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(VncError::Input("timeout cannot be zero".into()));
        }
        if let Transport::WebSocket(ws) = &self.transport {
            if ws.url_template.is_empty() {
                return Err(VncError::Input("url_template cannot be empty".into()));
            }
            if ws.host_port == 0 {
                return Err(VncError::Input("host_port cannot be 0".into()));
            }
        }
        Ok(())
    }

    /// The connect/read timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: None,
            password: None,
            timeout_ms: default_timeout_ms(),
            transport: Transport::Tcp,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the server hostname or IP address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the username (accepted, unused by RFB 3.8 auth).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    /// Sets the VNC password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Sets the connect/read timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Selects the WebSocket transport.
    #[must_use]
    pub fn websocket(mut self, ws: WebSocketConfig) -> Self {
        self.config.transport = Transport::WebSocket(ws);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
