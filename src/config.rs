//! Configuration module for Pulseboard.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the API server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "metrics.db")
    pub db_path: String,
    /// How often the live feed pushes a snapshot (default: 5s)
    pub live_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "metrics.db".to_string(),
            live_interval: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEBOARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `PULSEBOARD_DB_PATH`: Database file path (default: "metrics.db")
    /// - `PULSEBOARD_LIVE_INTERVAL_SECS`: Live feed push interval (default: 5)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = lookup("PULSEBOARD_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("PULSEBOARD_DB_PATH").filter(|s| !s.is_empty()) {
            cfg.db_path = db_path;
        }

        if let Some(secs) = lookup("PULSEBOARD_LIVE_INTERVAL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            cfg.live_interval = Duration::from_secs(secs);
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "metrics.db");
        assert_eq!(cfg.live_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let vars: HashMap<&str, &str> = [
            ("PULSEBOARD_HTTP_PORT", "9090"),
            ("PULSEBOARD_DB_PATH", "/tmp/pulse.db"),
            ("PULSEBOARD_LIVE_INTERVAL_SECS", "0"),
        ]
        .into_iter()
        .collect();
        let cfg = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.db_path, "/tmp/pulse.db");
        assert_eq!(cfg.live_interval, Duration::from_secs(5));

        let cfg = ServerConfig::from_lookup(|k| (k == "PULSEBOARD_HTTP_PORT").then(|| "http".to_string()));
        assert_eq!(cfg.http_port, 8080);
    }
}
