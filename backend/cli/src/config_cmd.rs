//! `studysnap config`: show the effective config or write a starter file.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use studysnap_config::{redact, write_config, SnapConfig};

use crate::terminal_output::{note_info, note_success, note_warn};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Write a config file with the current effective values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(action: ConfigAction, config: &SnapConfig, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            note_info(&format!("Config file: {}", path.display()));
            let yaml = serde_yaml::to_string(&redact(config))
                .context("Failed to render config")?;
            print!("{}", yaml);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                note_warn(&format!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                ));
                return Ok(());
            }
            // Credentials stay in the environment
            let mut starter = config.clone();
            starter.solver.api_key = None;
            write_config(&starter, path).await?;
            note_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}
