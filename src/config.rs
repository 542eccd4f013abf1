// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeviceError, Error, ProtocolError};

const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Plain MQTT port.
pub const MQTT_PORT: u16 = 1883;

/// MQTT over TLS port.
pub const MQTTS_PORT: u16 = 8883;

/// Configuration of one bridge.
///
/// Loads from JSON with either snake case keys or the keys hub plugin
/// configs use (`mhubId`, `brokerUrl`, `ca_path`, `client_key_path`,
/// `client_cert_path`).
///
/// # Examples
///
/// ```
/// use mhub_bridge::BridgeConfig;
///
/// let config = BridgeConfig::from_json_str(
///     r#"{"mhubId": "hub-1", "brokerUrl": "mqtts://broker.local", "ca_path": "ca.pem"}"#,
/// )
/// .unwrap();
/// assert_eq!(config.hub_id, "hub-1");
///
/// let address = config.broker_address().unwrap();
/// assert_eq!(address.port, 8883);
/// assert!(address.tls);
///
/// let config = BridgeConfig::new("hub-1", "mqtt://localhost:1883")
///     .with_credentials("user", "secret");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BridgeConfig {
    /// Hub identifier, used to derive topics.
    #[serde(alias = "mhubId")]
    pub hub_id: String,

    /// Broker URL (`mqtt://`, `tcp://`, `mqtts://`, `ssl://`, `tls://` or bare host).
    #[serde(alias = "brokerUrl")]
    pub broker_url: String,

    /// MQTT client id; generated when absent.
    #[serde(default, alias = "clientId")]
    pub client_id: Option<String>,

    /// Broker username.
    #[serde(default)]
    pub username: Option<String>,

    /// Broker password.
    #[serde(default)]
    pub password: Option<String>,

    /// CA certificate (PEM).
    #[serde(default, alias = "caPath")]
    pub ca_path: Option<PathBuf>,

    /// Client certificate (PEM).
    #[serde(default, alias = "clientCertPath")]
    pub client_cert_path: Option<PathBuf>,

    /// Client private key (PEM).
    #[serde(default, alias = "clientKeyPath")]
    pub client_key_path: Option<PathBuf>,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// How long to wait for the broker's ConnAck, in seconds.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Events buffered per subscriber before the slowest one lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Broker host, port and whether TLS is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// `true` for `mqtts://`, `ssl://` and `tls://` URLs.
    pub tls: bool,
}

impl BridgeConfig {
    /// Creates a configuration with defaults for everything but the hub id
    /// and the broker URL.
    #[must_use]
    pub fn new(hub_id: impl Into<String>, broker_url: impl Into<String>) -> Self {
        Self {
            hub_id: hub_id.into(),
            broker_url: broker_url.into(),
            client_id: None,
            username: None,
            password: None,
            ca_path: None,
            client_cert_path: None,
            client_key_path: None,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Parses a JSON configuration and validates it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for invalid JSON, or
    /// `DeviceError::InvalidConfiguration` if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json).map_err(crate::error::ParseError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file and validates it.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidConfiguration` if the file cannot be
    /// read, plus the errors of [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DeviceError::InvalidConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Sets a fixed client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets broker credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the CA certificate and the client certificate and key.
    #[must_use]
    pub fn with_tls(
        mut self,
        ca_path: impl Into<PathBuf>,
        client_cert_path: impl Into<PathBuf>,
        client_key_path: impl Into<PathBuf>,
    ) -> Self {
        self.ca_path = Some(ca_path.into());
        self.client_cert_path = Some(client_cert_path.into());
        self.client_key_path = Some(client_key_path.into());
        self
    }

    /// Sets the keep-alive interval, rounded up to whole seconds.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_secs = whole_secs_ceil(keep_alive);
        self
    }

    /// Sets the connection timeout, rounded up to whole seconds.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_secs = whole_secs_ceil(timeout);
        self
    }

    /// Sets the event bus capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns `true` if TLS material is configured.
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.ca_path.is_some()
    }

    /// Parses the broker URL.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the host is empty or the
    /// port is not a number.
    pub fn broker_address(&self) -> Result<BrokerAddress, ProtocolError> {
        parse_broker_url(&self.broker_url)
    }

    /// Checks the configuration for mistakes that would only show up at
    /// connection time.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidConfiguration` describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.hub_id.trim().is_empty() {
            return Err(DeviceError::InvalidConfiguration(
                "hub id must not be empty".to_string(),
            ));
        }
        if self.hub_id.contains(['/', '+', '#']) {
            return Err(DeviceError::InvalidConfiguration(format!(
                "hub id {:?} must not contain MQTT topic separators or wildcards",
                self.hub_id
            )));
        }

        let address = self
            .broker_address()
            .map_err(|e| DeviceError::InvalidConfiguration(e.to_string()))?;

        if address.tls && self.ca_path.is_none() {
            return Err(DeviceError::InvalidConfiguration(
                "a TLS broker URL needs ca_path".to_string(),
            ));
        }
        if self.client_cert_path.is_some() != self.client_key_path.is_some() {
            return Err(DeviceError::InvalidConfiguration(
                "client_cert_path and client_key_path must be set together".to_string(),
            ));
        }
        if self.client_cert_path.is_some() && self.ca_path.is_none() {
            return Err(DeviceError::InvalidConfiguration(
                "a client certificate needs ca_path".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(DeviceError::InvalidConfiguration(
                "username and password must be set together".to_string(),
            ));
        }
        if self.connection_timeout_secs == 0 {
            return Err(DeviceError::InvalidConfiguration(
                "connection timeout must be at least one second".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(DeviceError::InvalidConfiguration(
                "event capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rounds up so a non-zero duration never becomes zero seconds.
fn whole_secs_ceil(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Parses an MQTT URL into host, port and TLS flag.
fn parse_broker_url(url: &str) -> Result<BrokerAddress, ProtocolError> {
    let (rest, tls) = if let Some(rest) = url
        .strip_prefix("mqtts://")
        .or_else(|| url.strip_prefix("ssl://"))
        .or_else(|| url.strip_prefix("tls://"))
    {
        (rest, true)
    } else {
        let rest = url
            .strip_prefix("mqtt://")
            .or_else(|| url.strip_prefix("tcp://"))
            .unwrap_or(url);
        (rest, false)
    };
    let rest = rest.trim_end_matches('/');
    let default_port = if tls { MQTTS_PORT } else { MQTT_PORT };

    let (host, port) = if let Some((h, p)) = rest.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (rest.to_string(), default_port)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(format!(
            "no host in broker URL {url:?}"
        )));
    }
    Ok(BrokerAddress { host, port, tls })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_with_port() {
        let address = parse_broker_url("mqtt://192.168.1.50:1884").unwrap();
        assert_eq!(address.host, "192.168.1.50");
        assert_eq!(address.port, 1884);
        assert!(!address.tls);
    }

    #[test]
    fn parse_url_default_ports() {
        assert_eq!(parse_broker_url("broker.local").unwrap().port, MQTT_PORT);
        assert_eq!(parse_broker_url("tcp://broker.local").unwrap().port, MQTT_PORT);

        let secure = parse_broker_url("ssl://broker.local/").unwrap();
        assert_eq!(secure.host, "broker.local");
        assert_eq!(secure.port, MQTTS_PORT);
        assert!(secure.tls);
    }

    #[test]
    fn parse_url_errors() {
        assert!(matches!(
            parse_broker_url("mqtt://host:notaport"),
            Err(ProtocolError::InvalidAddress(_))
        ));
        assert!(parse_broker_url("mqtt://").is_err());
        assert!(parse_broker_url("mqtt://:1883").is_err());
    }

    #[test]
    fn from_plugin_style_json() {
        let config = BridgeConfig::from_json_str(
            r#"{
                "mhubId": "hub-9",
                "brokerUrl": "mqtts://broker:8884",
                "ca_path": "/etc/mhub/ca.pem",
                "client_cert_path": "/etc/mhub/cert.pem",
                "client_key_path": "/etc/mhub/key.pem"
            }"#,
        )
        .unwrap();
        assert_eq!(config.hub_id, "hub-9");
        assert_eq!(config.ca_path, Some(PathBuf::from("/etc/mhub/ca.pem")));
        assert_eq!(config.keep_alive(), Duration::from_secs(30));
        assert_eq!(config.event_capacity, 256);
        assert!(config.uses_tls());
        assert_eq!(config.broker_address().unwrap().port, 8884);
    }

    #[test]
    fn from_snake_case_json() {
        let config = BridgeConfig::from_json_str(
            r#"{"hub_id": "h", "broker_url": "localhost", "keep_alive_secs": 5}"#,
        )
        .unwrap();
        assert_eq!(config.keep_alive(), Duration::from_secs(5));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            BridgeConfig::from_json_str("{"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json_str(r#"{"hub_id": "h"}"#),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn validation_rules() {
        let ok = BridgeConfig::new("hub", "mqtt://localhost");
        assert!(ok.validate().is_ok());

        assert!(BridgeConfig::new(" ", "mqtt://localhost").validate().is_err());
        assert!(BridgeConfig::new("a/b", "mqtt://localhost").validate().is_err());
        assert!(BridgeConfig::new("hub", "mqtts://localhost").validate().is_err());
        assert!(BridgeConfig::new("hub", "mqtt://localhost:x").validate().is_err());

        let mut half_tls = BridgeConfig::new("hub", "mqtt://localhost");
        half_tls.ca_path = Some(PathBuf::from("ca.pem"));
        half_tls.client_cert_path = Some(PathBuf::from("cert.pem"));
        assert!(half_tls.validate().is_err());

        let mut half_auth = BridgeConfig::new("hub", "mqtt://localhost");
        half_auth.username = Some("user".to_string());
        assert!(half_auth.validate().is_err());

        assert!(
            BridgeConfig::new("hub", "mqtt://localhost")
                .with_event_capacity(0)
                .validate()
                .is_err()
        );
        assert!(
            BridgeConfig::new("hub", "mqtt://localhost")
                .with_connection_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn sub_second_durations_round_up() {
        let config = BridgeConfig::new("hub", "mqtt://localhost")
            .with_keep_alive(Duration::from_millis(500))
            .with_connection_timeout(Duration::from_millis(1500));
        assert_eq!(config.keep_alive(), Duration::from_secs(1));
        assert_eq!(config.connection_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());

        let exact = BridgeConfig::new("hub", "mqtt://localhost")
            .with_keep_alive(Duration::from_secs(20));
        assert_eq!(exact.keep_alive(), Duration::from_secs(20));
    }

    #[test]
    fn missing_file() {
        let err = BridgeConfig::from_json_file("/nonexistent/mhub.json").unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::InvalidConfiguration(_))
        ));
    }
}
