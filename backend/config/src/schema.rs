//! StudySnap configuration schema.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills in
//! the rest and the accessors below never return an unset value.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BASE_URL, DEFAULT_BIND, DEFAULT_LOG_LEVEL, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MODEL,
    DEFAULT_PORT,
};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapConfig {
    /// Hosted model credentials and endpoint
    #[serde(default)]
    pub solver: SolverConfig,

    /// HTTP API server
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Largest accepted `POST /api/problems` body, all parts together
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for rolling NDJSON logs; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl SnapConfig {
    pub fn model(&self) -> &str {
        self.solver.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.solver.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn bind_address(&self) -> &str {
        self.server.bind_address.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// The credential, if configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.solver
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_yaml() {
        let yaml = "solver:\n  apiKey: abc\nserver:\n  port: 9000\n";
        let config: SnapConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api_key(), Some("abc"));
        assert_eq!(config.port(), 9000);
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.max_upload_bytes(), DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn parses_upload_limit() {
        let yaml = "server:\n  maxUploadBytes: 1048576\n";
        let config: SnapConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_upload_bytes(), 1024 * 1024);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let mut config = SnapConfig::default();
        config.solver.api_key = Some("   ".into());
        assert!(config.api_key().is_none());
    }
}
