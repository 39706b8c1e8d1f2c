//! Environment handling for config values.
//!
//! Two mechanisms, applied in this order:
//! - `${VAR_NAME}` references inside string values of the config file are
//!   substituted at load time (`$${VAR}` stays literal as `${VAR}`).
//! - Well-known variables override file values (`GEMINI_API_KEY`, `API_KEY`,
//!   `STUDYSNAP_*`).

use std::collections::HashMap;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schema::SnapConfig;

/// Pattern matching `${VAR}` and escaped `$${VAR}` references.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Credential variables, highest priority first.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Snapshot of the process environment.
pub fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Substitute `${VAR}` references in every string of the config.
pub fn resolve_env_refs(config: SnapConfig, env: &HashMap<String, String>) -> Result<SnapConfig> {
    let value = serde_json::to_value(&config).context("Failed to serialize config for env substitution")?;
    let value = substitute_value(&value, env, "")?;
    serde_json::from_value(value).context("Failed to deserialize config after env substitution")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        // Primitives pass through unchanged.
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &regex::Captures| {
        let var_name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{}}}", var_name);
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    match missing {
        Some(err) => Err(err.into()),
        None => Ok(substituted.into_owned()),
    }
}

/// Apply well-known environment overrides on top of file values.
pub fn apply_env_overrides(mut config: SnapConfig, env: &HashMap<String, String>) -> Result<SnapConfig> {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(key) = API_KEY_VARS.iter().find_map(|name| get(*name)) {
        config.solver.api_key = Some(key.to_string());
    }
    if let Some(model) = get("STUDYSNAP_MODEL") {
        config.solver.model = Some(model.to_string());
    }
    if let Some(url) = get("STUDYSNAP_BASE_URL") {
        config.solver.base_url = Some(url.to_string());
    }
    if let Some(bind) = get("STUDYSNAP_BIND") {
        config.server.bind_address = Some(bind.to_string());
    }
    if let Some(port) = get("STUDYSNAP_PORT") {
        let port = port
            .parse::<u16>()
            .with_context(|| format!("STUDYSNAP_PORT is not a valid port: {}", port))?;
        config.server.port = Some(port);
    }
    if let Some(limit) = get("STUDYSNAP_MAX_UPLOAD_BYTES") {
        let limit = limit.parse::<usize>().with_context(|| {
            format!("STUDYSNAP_MAX_UPLOAD_BYTES is not a byte count: {}", limit)
        })?;
        config.server.max_upload_bytes = Some(limit);
    }
    if let Some(level) = get("STUDYSNAP_LOG_LEVEL") {
        config.logging.level = Some(level.to_string());
    }
    if let Some(dir) = get("STUDYSNAP_LOG_DIR") {
        config.logging.dir = Some(dir.to_string());
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_api_key_reference() {
        let mut config = SnapConfig::default();
        config.solver.api_key = Some("${MY_GEMINI_KEY}".into());
        let config = resolve_env_refs(config, &env(&[("MY_GEMINI_KEY", "AIza-test")])).unwrap();
        assert_eq!(config.api_key(), Some("AIza-test"));
    }

    #[test]
    fn error_on_missing_var() {
        let mut config = SnapConfig::default();
        config.solver.base_url = Some("${MISSING_VAR}/v1".into());
        let err = resolve_env_refs(config, &HashMap::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("MISSING_VAR"), "{}", message);
        assert!(message.contains("solver.baseUrl"), "{}", message);
    }

    #[test]
    fn escaped_reference_stays_literal() {
        let mut config = SnapConfig::default();
        config.solver.model = Some("$${NOT_A_VAR}".into());
        let config = resolve_env_refs(config, &HashMap::new()).unwrap();
        assert_eq!(config.model(), "${NOT_A_VAR}");
    }

    #[test]
    fn gemini_key_beats_generic_key() {
        let config = apply_env_overrides(
            SnapConfig::default(),
            &env(&[("API_KEY", "generic"), ("GEMINI_API_KEY", "specific")]),
        )
        .unwrap();
        assert_eq!(config.api_key(), Some("specific"));
    }

    #[test]
    fn overrides_server_and_logging() {
        let config = apply_env_overrides(
            SnapConfig::default(),
            &env(&[("STUDYSNAP_PORT", "9123"), ("STUDYSNAP_LOG_DIR", "/tmp/logs"), ("STUDYSNAP_BIND", " ")]),
        )
        .unwrap();
        assert_eq!(config.port(), 9123);
        assert_eq!(config.logging.dir.as_deref(), Some("/tmp/logs"));
        assert!(config.server.bind_address.is_none());
    }

    #[test]
    fn overrides_upload_limit() {
        let config = apply_env_overrides(
            SnapConfig::default(),
            &env(&[("STUDYSNAP_MAX_UPLOAD_BYTES", "5000000")]),
        )
        .unwrap();
        assert_eq!(config.max_upload_bytes(), 5_000_000);

        let result = apply_env_overrides(
            SnapConfig::default(),
            &env(&[("STUDYSNAP_MAX_UPLOAD_BYTES", "32MB")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_port() {
        let result = apply_env_overrides(SnapConfig::default(), &env(&[("STUDYSNAP_PORT", "http")]));
        assert!(result.is_err());
    }
}
