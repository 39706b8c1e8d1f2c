//! Config validation with user-friendly error messages.

use crate::schema::SnapConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SnapConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_solver(config, &mut report);
    validate_server(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_solver(config: &SnapConfig, report: &mut ValidationReport) {
    if config.api_key().is_none() {
        report.error(
            "solver.apiKey",
            "No API key configured; set GEMINI_API_KEY or API_KEY",
        );
    }
    if config.model().trim().is_empty() {
        report.error("solver.model", "Model name cannot be empty");
    }
    let base_url = config.base_url();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        report.error(
            "solver.baseUrl",
            format!("Base URL must start with http:// or https://, got '{base_url}'"),
        );
    }
}

fn validate_server(config: &SnapConfig, report: &mut ValidationReport) {
    if config.bind_address().trim().is_empty() {
        report.error("server.bindAddress", "Bind address cannot be empty");
    }
    if config.port() == 0 {
        report.warn("server.port", "Port 0 binds a random port");
    }
    if config.max_upload_bytes() == 0 {
        report.error("server.maxUploadBytes", "Upload limit must be greater than zero");
    }
}

fn validate_logging(config: &SnapConfig, report: &mut ValidationReport) {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    let level = config.log_level();
    // Full filter directives like "studysnap=debug" are accepted as-is
    if !level.contains('=') && !LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn("logging.level", format!("Unknown log level '{level}'"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;

    fn with_key() -> SnapConfig {
        let mut config = SnapConfig::default();
        config.solver.api_key = Some("test-key".into());
        apply_all_defaults(config)
    }

    #[test]
    fn test_defaults_with_key_are_valid() {
        let report = validate(&with_key());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_key_is_error() {
        let report = validate(&apply_all_defaults(SnapConfig::default()));
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "solver.apiKey");
    }

    #[test]
    fn test_bad_base_url() {
        let mut config = with_key();
        config.solver.base_url = Some("generativelanguage.googleapis.com".into());
        let report = validate(&config);
        assert!(report.errors.iter().any(|e| e.path == "solver.baseUrl"));
    }

    #[test]
    fn test_port_zero_warns() {
        let mut config = with_key();
        config.server.port = Some(0);
        let report = validate(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "server.port");
    }

    #[test]
    fn test_zero_upload_limit_is_error() {
        let mut config = with_key();
        config.server.max_upload_bytes = Some(0);
        let report = validate(&config);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "server.maxUploadBytes");
    }

    #[test]
    fn test_unknown_log_level_warns() {
        let mut config = with_key();
        config.logging.level = Some("loud".into());
        assert_eq!(validate(&config).warnings[0].path, "logging.level");

        config.logging.level = Some("studysnap_session=debug".into());
        assert!(validate(&config).warnings.is_empty());
    }
}
