//! Configuration module for Nutrivance.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Where health data is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// Samples logged into the local database.
    Local,
    /// A remote JSON health-data service.
    Http { url: String },
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "nutrivance.db")
    pub db_path: String,
    /// Fallback widget refresh interval (default: 15 minutes)
    pub refresh_interval: Duration,
    /// Health data source (default: local)
    pub provider: ProviderKind,
    /// Per-request timeout for the remote provider (default: 5s)
    pub provider_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "nutrivance.db".to_string(),
            refresh_interval: Duration::from_secs(15 * 60),
            provider: ProviderKind::Local,
            provider_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NUTRIVANCE_HTTP_PORT`: HTTP port (default: 8080)
    /// - `NUTRIVANCE_DB_PATH`: Database file path (default: "nutrivance.db")
    /// - `NUTRIVANCE_REFRESH_SECS`: widget refresh interval (default: 900)
    /// - `NUTRIVANCE_PROVIDER`: `local` or `http` (default: local)
    /// - `NUTRIVANCE_PROVIDER_URL`: base URL for the `http` provider
    /// - `NUTRIVANCE_PROVIDER_TIMEOUT_SECS`: remote timeout (default: 5)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("NUTRIVANCE_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("NUTRIVANCE_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(secs) = lookup("NUTRIVANCE_REFRESH_SECS").and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                cfg.refresh_interval = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = lookup("NUTRIVANCE_PROVIDER_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                cfg.provider_timeout = Duration::from_secs(secs);
            }
        }

        if lookup("NUTRIVANCE_PROVIDER").as_deref() == Some("http") {
            match lookup("NUTRIVANCE_PROVIDER_URL") {
                Some(url) if !url.is_empty() => cfg.provider = ProviderKind::Http { url },
                _ => tracing::warn!("NUTRIVANCE_PROVIDER=http without NUTRIVANCE_PROVIDER_URL, using local data"),
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "nutrivance.db");
        assert_eq!(cfg.refresh_interval, Duration::from_secs(900));
        assert_eq!(cfg.provider, ProviderKind::Local);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = load_from(&[
            ("NUTRIVANCE_HTTP_PORT", "9090"),
            ("NUTRIVANCE_REFRESH_SECS", "60"),
            ("NUTRIVANCE_PROVIDER", "http"),
            ("NUTRIVANCE_PROVIDER_URL", "http://health.local"),
        ]);
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(60));
        assert_eq!(
            cfg.provider,
            ProviderKind::Http {
                url: "http://health.local".to_string()
            }
        );
    }

    #[test]
    fn test_bad_values_fall_back() {
        let cfg = load_from(&[
            ("NUTRIVANCE_HTTP_PORT", "not-a-port"),
            ("NUTRIVANCE_REFRESH_SECS", "0"),
            ("NUTRIVANCE_PROVIDER", "http"),
        ]);
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(900));
        assert_eq!(cfg.provider, ProviderKind::Local);
    }
}
