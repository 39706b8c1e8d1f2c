//! Config defaults: applies default values to a parsed config.

use crate::schema::SnapConfig;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
/// Room for a batch of full-resolution phone photos.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: SnapConfig) -> SnapConfig {
    let config = apply_solver_defaults(config);
    let config = apply_server_defaults(config);
    apply_logging_defaults(config)
}

fn apply_solver_defaults(mut config: SnapConfig) -> SnapConfig {
    config
        .solver
        .model
        .get_or_insert_with(|| DEFAULT_MODEL.to_string());
    config
        .solver
        .base_url
        .get_or_insert_with(|| DEFAULT_BASE_URL.to_string());
    config
}

fn apply_server_defaults(mut config: SnapConfig) -> SnapConfig {
    config
        .server
        .bind_address
        .get_or_insert_with(|| DEFAULT_BIND.to_string());
    config.server.port.get_or_insert(DEFAULT_PORT);
    config
        .server
        .max_upload_bytes
        .get_or_insert(DEFAULT_MAX_UPLOAD_BYTES);
    config
}

fn apply_logging_defaults(mut config: SnapConfig) -> SnapConfig {
    config
        .logging
        .level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    config
}
