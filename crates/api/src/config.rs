//! Server configuration

use serde::{Deserialize, Serialize};

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener and database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,
    /// SQLite database URL
    pub database_url: String,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// Allow cross-origin requests from the quiz pages
    pub enable_cors: bool,
    /// Expose Prometheus metrics at /metrics
    pub enable_metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite://integrity.db".to_string(),
            max_connections: 5,
            enable_cors: true,
            enable_metrics: true,
        }
    }
}

/// Ledger thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ledger count at which an in-progress attempt is submitted
    pub auto_submit_threshold: i64,
    /// Violations at which a reviewer summary marks an attempt suspicious
    pub suspicious_threshold: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            auto_submit_threshold: 100,
            suspicious_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, overridden by RUST_LOG
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl IntegrityConfig {
    /// Load defaults, then an optional file, then `INTEGRITY__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&IntegrityConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // e.g. INTEGRITY__LEDGER__AUTO_SUBMIT_THRESHOLD=50
        builder = builder.add_source(
            config::Environment::with_prefix("INTEGRITY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = IntegrityConfig::default();
        assert_eq!(config.ledger.auto_submit_threshold, 100);
        assert_eq!(config.ledger.suspicious_threshold, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.server.listen_addr.ends_with(":8080"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("integrity-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[ledger]\nauto_submit_threshold = 25\n\n[logging]\njson = true").unwrap();

        let config = IntegrityConfig::load(path.to_str()).unwrap();
        assert_eq!(config.ledger.auto_submit_threshold, 25);
        assert_eq!(config.ledger.suspicious_threshold, 3);
        assert!(config.logging.json);
        assert_eq!(config.server, ServerConfig::default());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = IntegrityConfig::load(Some("/nonexistent/integrity")).unwrap();
        assert_eq!(config.ledger, LedgerConfig::default());
    }
}
