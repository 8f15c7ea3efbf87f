use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CommandError, FileSessionStore, HttpRemoteService, MediaFile, View, ViewController,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod views;

#[derive(Parser, Debug)]
#[command(name = "clarity", about = "Meeting clarity analysis client")]
struct Args {
    /// Base URL of the analysis service, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Where the session identity is persisted between runs.
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with an existing account.
    Login(Credentials),
    /// Create an account and log in.
    Signup(Credentials),
    /// Upload a meeting video for analysis.
    Analyze { path: Option<PathBuf> },
    /// Show the clarity trend of past meetings.
    History,
    Logout,
    /// Show the current view.
    Status,
}

#[derive(clap::Args, Debug)]
struct Credentials {
    #[arg(long)]
    username: String,
    #[arg(long, env = "CLARITY_PASSWORD", hide_env_values = true)]
    password: String,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn describe_error(err: &CommandError) -> String {
    match err {
        CommandError::InvalidState {
            state: View::Unauthenticated,
            ..
        } => "Not signed in; run `clarity login` first.".to_string(),
        CommandError::InvalidState {
            command: "submit_auth" | "toggle_auth_mode",
            ..
        } => "Already signed in; run `clarity logout` first.".to_string(),
        other => other.to_string(),
    }
}

async fn load_media(path: Option<PathBuf>) -> Result<Option<MediaFile>, CommandError> {
    let Some(path) = path else {
        return Ok(None);
    };
    match MediaFile::from_path(&path).await {
        Ok(media) => Ok(Some(media)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "analyze: could not read media file");
            Err(CommandError::Validation(format!(
                "Could not read {}: {err}",
                path.display()
            )))
        }
    }
}

/// Builds the controller for one run and issues its startup effects, so a
/// restored session gets its history like a fresh login does.
fn open_controller(settings: &config::Settings) -> Arc<ViewController> {
    let controller = ViewController::new(
        Arc::new(HttpRemoteService::new(settings.api_base_url.clone())),
        Arc::new(FileSessionStore::new(settings.session_file.clone())),
    );
    controller.start();
    controller
}

async fn run_command(
    controller: &Arc<ViewController>,
    command: Command,
) -> Result<(), CommandError> {
    match command {
        Command::Login(credentials) => {
            controller
                .submit_auth(&credentials.username, &credentials.password)
                .await
        }
        Command::Signup(credentials) => {
            controller.toggle_auth_mode()?;
            controller
                .submit_auth(&credentials.username, &credentials.password)
                .await
        }
        Command::Analyze { path } => {
            let media = load_media(path).await?;
            controller.submit_analysis(media).await.map(|_| ())
        }
        Command::History => {
            if controller.view() == View::Unauthenticated {
                return Err(CommandError::InvalidState {
                    command: "history",
                    state: View::Unauthenticated,
                });
            }
            controller.refresh_history().await;
            Ok(())
        }
        Command::Logout => {
            controller.logout();
            Ok(())
        }
        Command::Status => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let settings = config::load_settings()
        .context("failed to load settings")?
        .with_overrides(args.api_url, args.session_file)
        .context("invalid command-line override")?;
    init_tracing(&settings.log_filter);
    info!(
        api = %settings.api_base_url,
        session_file = %settings.session_file.display(),
        "clarity: starting"
    );

    let controller = open_controller(&settings);
    let outcome = run_command(&controller, args.command).await;
    controller.settle_background().await;

    println!("{}", views::render(&controller.snapshot()));
    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error: {}", describe_error(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}
