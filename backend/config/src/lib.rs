//! `studysnap-config`: StudySnap runtime configuration.
//!
//! Provides:
//! - Typed config schema
//! - YAML read/write with backup rotation
//! - `${ENV_VAR}` substitution and well-known env overrides
//! - Default value application and validation
//! - Redaction for safe display

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, process_env, resolve_env_refs, MissingEnvVarError, API_KEY_VARS};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use redact::{redact, redact_value};
pub use schema::{LoggingConfig, ServerConfig, SnapConfig, SolverConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use studysnap_core::SnapError;

/// Message shown when no credential is available.
pub const MISSING_API_KEY_MESSAGE: &str =
    "API Key is missing. Please check your environment configuration.";

/// Load the config file, apply env substitution, overrides, and defaults.
///
/// This is the main entry point for loading a config at runtime. It runs
/// before logging is set up, so it does not validate; call
/// [`report_validation`] once a subscriber is installed. Callers that need a
/// credential go through [`require_api_key`].
pub async fn load_and_prepare(path: &Path) -> Result<SnapConfig> {
    prepare(load_config(path).await?, &process_env())
}

/// Load from the default location (`config_dir()/config.yaml`).
pub async fn load() -> Result<SnapConfig> {
    load_and_prepare(&config_file_path(&config_dir())).await
}

/// The post-load pipeline, separated from IO for testing.
pub fn prepare(config: SnapConfig, env: &HashMap<String, String>) -> Result<SnapConfig> {
    let config = resolve_env_refs(config, env).context("Failed to resolve env vars in config")?;
    let config = apply_env_overrides(config, env)?;
    Ok(apply_all_defaults(config))
}

/// Validate a prepared config and log every warning and error.
pub fn report_validation(config: &SnapConfig) -> ValidationReport {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    report
}

/// The credential, or the fatal configuration error shown before any solve.
pub fn require_api_key(config: &SnapConfig) -> Result<&str, SnapError> {
    config
        .api_key()
        .ok_or_else(|| SnapError::Config(MISSING_API_KEY_MESSAGE.to_string()))
}
