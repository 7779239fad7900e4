//! Touch input configuration.
//!
//! A [`TouchConfig`] is usually loaded from a TOML file:
//!
//! ```toml
//! dpi = 96.0
//!
//! [tuio]
//! version = "2.0"
//! connection = "udp"
//! ip_address = "0.0.0.0"
//! port = 3333
//!
//! [tap]
//! distance_limit = 1.0
//! cluster_existence_time = 0.3
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TouchError};

/// Centimeters per inch.
const CM_PER_INCH: f32 = 2.54;

/// Reject densities that would make centimeter distances meaningless.
pub(crate) fn check_density(dots_per_centimeter: f32) -> Result<()> {
    if dots_per_centimeter.is_finite() && dots_per_centimeter > 0.0 {
        Ok(())
    } else {
        Err(TouchError::config(format!(
            "dots per centimeter must be positive, got {dots_per_centimeter}"
        )))
    }
}

/// The TUIO protocol version spoken by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TuioVersion {
    /// TUIO 1.1.
    #[default]
    #[serde(rename = "1.1", alias = "tuio11", alias = "Tuio11")]
    Tuio11,
    /// TUIO 2.0.
    #[serde(rename = "2.0", alias = "tuio20", alias = "Tuio20")]
    Tuio20,
}

impl TuioVersion {
    /// The port a WebSocket tracker serves this version on.
    pub fn websocket_port(self) -> u16 {
        match self {
            Self::Tuio11 => 3333,
            Self::Tuio20 => 3343,
        }
    }
}

impl fmt::Display for TuioVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tuio11 => write!(f, "1.1"),
            Self::Tuio20 => write!(f, "2.0"),
        }
    }
}

impl FromStr for TuioVersion {
    type Err = TouchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1.1" | "tuio11" | "tuio1.1" => Ok(Self::Tuio11),
            "2.0" | "tuio20" | "tuio2.0" => Ok(Self::Tuio20),
            _ => Err(TouchError::UnsupportedVersion(s.to_owned())),
        }
    }
}

/// The transport carrying TUIO traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Listen for datagrams on `ip_address:port`.
    #[default]
    #[serde(rename = "udp", alias = "UDP")]
    Udp,
    /// Connect to a WebSocket server at `ws://ip_address:port`.
    #[serde(rename = "websocket", alias = "WebSocket", alias = "ws")]
    WebSocket,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => write!(f, "udp"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

/// TUIO connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuioConfig {
    pub version: TuioVersion,
    pub connection: ConnectionType,
    pub ip_address: String,
    pub port: u16,
    /// Pointers pre-created in each of the touch and object pools.
    pub pool_capacity: usize,
}

impl Default for TuioConfig {
    fn default() -> Self {
        Self {
            version: TuioVersion::default(),
            connection: ConnectionType::default(),
            ip_address: "127.0.0.1".to_owned(),
            port: 3333,
            pool_capacity: 50,
        }
    }
}

impl TuioConfig {
    /// Set the protocol version.
    pub fn version(mut self, version: TuioVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the transport.
    pub fn connection(mut self, connection: ConnectionType) -> Self {
        self.connection = connection;
        self
    }

    /// Set the IP address.
    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self
    }

    /// Set the UDP port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the pool capacity.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Check the address and port.
    pub fn validate(&self) -> Result<()> {
        self.ip()?;
        if self.connection == ConnectionType::Udp && self.port == 0 {
            return Err(TouchError::InvalidPort(self.port));
        }
        Ok(())
    }

    /// The parsed IP address.
    pub fn ip(&self) -> Result<IpAddr> {
        self.ip_address
            .parse()
            .map_err(|_| TouchError::InvalidAddress(self.ip_address.clone()))
    }

    /// The port actually used.
    ///
    /// WebSocket trackers serve each version on a fixed port, so the
    /// configured port only applies to UDP.
    pub fn effective_port(&self) -> u16 {
        match self.connection {
            ConnectionType::Udp => self.port,
            ConnectionType::WebSocket => self.version.websocket_port(),
        }
    }

    /// The address to bind or connect to.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.ip()?, self.effective_port()))
    }
}

/// Tap gesture thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Longest tap in seconds.
    pub time_limit: f64,
    /// Longest movement in centimeters.
    pub distance_limit: f32,
    /// How long a release still counts towards a tap, in seconds.
    pub cluster_existence_time: f64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            time_limit: f64::INFINITY,
            distance_limit: f32::INFINITY,
            cluster_existence_time: 0.3,
        }
    }
}

/// Complete touch input configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    /// Display density used to derive the centimeter scale.
    pub dpi: f32,
    /// Explicit centimeter scale, overriding `dpi`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dots_per_centimeter: Option<f32>,
    pub tuio: TuioConfig,
    pub tap: TapConfig,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            dpi: 96.0,
            dots_per_centimeter: None,
            tuio: TuioConfig::default(),
            tap: TapConfig::default(),
        }
    }
}

impl TouchConfig {
    /// Pixels per centimeter on the target display.
    pub fn dots_per_centimeter(&self) -> f32 {
        self.dots_per_centimeter.unwrap_or(self.dpi / CM_PER_INCH)
    }

    /// Parse a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TouchError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| TouchError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TouchError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TouchError::config(e.to_string()))
    }

    /// Write to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|e| TouchError::io(path, e))
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.tuio.validate()?;
        check_density(self.dots_per_centimeter())
    }
}
