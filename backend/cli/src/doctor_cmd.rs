//! `studysnap doctor`: configuration diagnosis.

use std::path::Path;

use anyhow::Result;

use studysnap_config::{redact, validate, SnapConfig, API_KEY_VARS};

/// Executes the full doctor diagnosis.
pub async fn run(config: &SnapConfig, config_path: &Path) -> Result<()> {
    println!("\n🔍 Running StudySnap Doctor...\n");

    let is_ok = check_config_file(config_path) & check_credentials(config) & check_settings(config);

    println!();
    println!("Effective configuration:");
    println!("{}", serde_json::to_string_pretty(&redact(config))?);

    println!();
    if is_ok {
        println!("✅ All checks passed! StudySnap is ready to solve.");
    } else {
        println!("❌ Some checks failed! Please fix the errors above.");
    }

    Ok(())
}

fn check_config_file(path: &Path) -> bool {
    println!("Checking Config File:");
    if path.exists() {
        println!("  🟢 {} found", path.display());
    } else {
        println!("  🟡 {} not found (optional, defaults apply)", path.display());
    }
    true
}

fn check_credentials(config: &SnapConfig) -> bool {
    println!("Checking Credentials:");

    for var in API_KEY_VARS {
        match std::env::var(var) {
            Ok(val) if !val.trim().is_empty() => println!("  🟢 {} is set", var),
            _ => println!("  🟡 {} is not set", var),
        }
    }

    if config.api_key().is_some() {
        println!("  🟢 API key resolved");
        true
    } else {
        println!("  🔴 API key is missing (REQUIRED)");
        false
    }
}

fn check_settings(config: &SnapConfig) -> bool {
    println!("Checking Settings:");
    println!("  🟢 Model: {}", config.model());
    println!("  🟢 Endpoint: {}", config.base_url());
    match &config.logging.dir {
        Some(dir) => println!("  🟢 Log directory: {}", dir),
        None => println!("  🟡 No log directory (console logging only)"),
    }

    let report = validate(config);
    for warning in &report.warnings {
        println!("  🟡 {}: {}", warning.path, warning.message);
    }
    // The credential error is already reported above
    let errors: Vec<_> = report
        .errors
        .iter()
        .filter(|e| e.path != "solver.apiKey")
        .collect();
    for error in &errors {
        println!("  🔴 {}: {}", error.path, error.message);
    }
    errors.is_empty()
}
