//! Konfiguration des Signalling-Kanals
//!
//! Standardwerte können über Umgebungsvariablen überschrieben werden:
//! - `WS_URL`: Endpoint des Signalling-Servers
//! - `SIGNALLING_HEARTBEAT_SECS`: Heartbeat-Intervall in Sekunden

use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Standard-Endpoint des Signalling-Servers
pub const DEFAULT_ENDPOINT: &str = "https://konference-api.herokuapp.com/ws";

/// Standard-Intervall zwischen zwei Heartbeats
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub const ENDPOINT_ENV: &str = "WS_URL";
pub const HEARTBEAT_ENV: &str = "SIGNALLING_HEARTBEAT_SECS";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid heartbeat interval: {0}")]
    InvalidHeartbeat(String),
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignallingConfig {
    endpoint: String,
    heartbeat_interval: Duration,
}

impl Default for SignallingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl SignallingConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Liest die Konfiguration aus der Umgebung
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup(ENDPOINT_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let config = Self::new(endpoint);

        match lookup(HEARTBEAT_ENV) {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidHeartbeat(raw.clone()))?;
                config.with_heartbeat_interval(Duration::from_secs(secs))
            }
            None => Ok(config),
        }
    }

    /// Setzt das Heartbeat-Intervall (muss > 0 sein)
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidHeartbeat(format!("{:?}", interval)));
        }
        self.heartbeat_interval = interval;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Parst den Endpoint und bildet http(s) auf ws(s) ab
    pub fn websocket_endpoint(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.endpoint)?;

        let scheme = match url.scheme() {
            "http" => Some("ws"),
            "https" => Some("wss"),
            _ => None,
        };
        if let Some(scheme) = scheme {
            // http -> ws ist zwischen "special" Schemes immer erlaubt
            let _ = url.set_scheme(scheme);
        }

        Ok(url)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SignallingConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let config = SignallingConfig::from_lookup(lookup_from(&[
            (ENDPOINT_ENV, "ws://localhost:8080/ws"),
            (HEARTBEAT_ENV, "5"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint(), "ws://localhost:8080/ws");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_heartbeat() {
        let err = SignallingConfig::from_lookup(lookup_from(&[(HEARTBEAT_ENV, "soon")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidHeartbeat("soon".to_string()));

        assert!(SignallingConfig::from_lookup(lookup_from(&[(HEARTBEAT_ENV, "0")])).is_err());
    }

    #[test]
    fn test_websocket_scheme_mapping() {
        let https = SignallingConfig::new("https://konference-api.herokuapp.com/ws");
        assert_eq!(
            https.websocket_endpoint().unwrap().as_str(),
            "wss://konference-api.herokuapp.com/ws"
        );

        let http = SignallingConfig::new("http://localhost:8080/ws");
        assert_eq!(http.websocket_endpoint().unwrap().as_str(), "ws://localhost:8080/ws");

        let wss = SignallingConfig::new("wss://example/ws");
        assert_eq!(wss.websocket_endpoint().unwrap().as_str(), "wss://example/ws");

        assert!(SignallingConfig::new("not a url").websocket_endpoint().is_err());
    }
}
