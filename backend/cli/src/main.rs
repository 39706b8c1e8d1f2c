mod api;
mod config_cmd;
mod doctor_cmd;
mod solve_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use studysnap_config::{
    config_dir, config_file_path, load_and_prepare, report_validation, require_api_key, SnapConfig,
};
use studysnap_core::Subject;
use studysnap_logging::init_logger;
use studysnap_session::StudySession;
use studysnap_solver::{GeminiProvider, SolveResolver};

use api::AppState;
use config_cmd::ConfigAction;
use solve_cmd::SolveArgs;

#[derive(Parser)]
#[command(name = "studysnap")]
#[command(about = "StudySnap: photograph homework, get step-by-step solutions")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.studysnap/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one or more problem photos
    Solve {
        /// Image files; non-images are skipped in batch mode
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Subject hint for the tutor
        #[arg(short, long, default_value = "general")]
        subject: Subject,
        /// Consider only the first file and reject it if it is not an image
        #[arg(long)]
        single: bool,
        /// Print the final items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the HTTP API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask a running server for its status
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Diagnose the configuration
    Doctor,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            terminal_output::note_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&config_path).await?;

    let log_dir = config.logging.dir.as_deref().map(PathBuf::from);
    let _log_guard = init_logger(log_dir.as_deref(), config.log_level());
    info!(path = %config_path.display(), "Config loaded");
    report_validation(&config);

    match cli.command {
        Commands::Solve {
            files,
            subject,
            single,
            json,
        } => {
            let session = build_session(&config)?;
            solve_cmd::run(
                &session,
                SolveArgs {
                    files,
                    subject,
                    single,
                    json,
                },
            )
            .await?;
        }
        Commands::Serve { port } => {
            let session = build_session(&config)?.with_previews(true);
            let port = port.unwrap_or_else(|| config.port());
            run_server(&config, session, port).await?;
        }
        Commands::Status { port } => {
            let port = port.unwrap_or_else(|| config.port());
            print_status(&config, port).await?;
        }
        Commands::Doctor => doctor_cmd::run(&config, &config_path).await?,
        Commands::Config { action } => config_cmd::run(action, &config, &config_path).await?,
    }

    Ok(())
}

/// Wire the hosted model into a fresh session.
///
/// A missing credential is fatal here, before any solve attempt.
fn build_session(config: &SnapConfig) -> Result<StudySession> {
    let api_key = require_api_key(config)?;
    let provider = GeminiProvider::new(api_key).with_base_url(config.base_url());
    let resolver = SolveResolver::new(Arc::new(provider), config.model());
    Ok(StudySession::start(resolver))
}

async fn run_server(config: &SnapConfig, session: StudySession, port: u16) -> Result<()> {
    let addr = format!("{}:{}", config.bind_address(), port);
    info!(
        addr = %addr,
        model = %config.model(),
        max_upload_bytes = config.max_upload_bytes(),
        "Starting StudySnap server"
    );

    let state = Arc::new(AppState {
        session,
        model: config.model().to_string(),
        max_upload_bytes: config.max_upload_bytes(),
    });
    let app = api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler; run until killed
        std::future::pending::<()>().await;
    }
}

async fn print_status(config: &SnapConfig, port: u16) -> Result<()> {
    let host = match config.bind_address() {
        "0.0.0.0" => "127.0.0.1",
        other => other,
    };
    let base = format!("http://{}:{}", host, port);
    let client = reqwest::Client::new();

    match client.get(format!("{}/api/health", base)).send().await {
        Ok(resp) => {
            let health: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            let problems: serde_json::Value = client
                .get(format!("{}/api/problems", base))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", serde_json::to_string_pretty(&problems["counts"])?);
        }
        Err(_) => {
            terminal_output::note_warn(&format!("StudySnap is not running on port {}", port));
        }
    }
    Ok(())
}
