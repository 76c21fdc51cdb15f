use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ChatSession, HttpBackend, InitOutcome, ResumeUpload, SendOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "resume-chat", about = "Chat with the resume assistant backend")]
struct Args {
    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// TOML settings file (defaults to ./resume_chat.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        question: String,
        /// Print the transcript entry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the backend's resume with a PDF file
    Reload { path: PathBuf },
    /// Show backend health
    Health,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout_secs = secs;
    }
    init_tracing(&settings);

    let backend = HttpBackend::with_timeouts(&settings.backend_url, settings.timeouts())
        .with_context(|| format!("failed to set up backend client for {}", settings.backend_url))?;
    let session = ChatSession::new(Arc::new(backend));
    info!(
        session_id = %session.id(),
        backend = %settings.backend_url,
        "resume chat starting"
    );

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => repl::run(session).await,
        Command::Ask { question, json } => ask_once(session, &question, json).await,
        Command::Reload { path } => reload(session, path).await,
        Command::Health => {
            let health = session.health().await.context("health check failed")?;
            println!("{}", render::health(&health));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn ask_once(session: Arc<ChatSession>, question: &str, json: bool) -> Result<ExitCode> {
    if let InitOutcome::Failed(failure) = session.initialize().await {
        eprintln!("Initialization error: {failure}");
        return Ok(ExitCode::FAILURE);
    }

    let outcome = session.send_question(question).await;
    session.close().await;
    let message = match outcome {
        SendOutcome::Answered(message) | SendOutcome::Failed(message) => message,
        SendOutcome::Rejected(rejected) => {
            eprintln!("question not sent: {rejected}");
            return Ok(ExitCode::FAILURE);
        }
        SendOutcome::Discarded => return Ok(ExitCode::FAILURE),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        println!("{}", render::message(&message));
    }
    Ok(if message.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn reload(session: Arc<ChatSession>, path: PathBuf) -> Result<ExitCode> {
    let upload = ResumeUpload::from_path(&path).await?;
    let status = session.reload_resume(upload).await?;
    println!("{}", render::upload_status(&status));
    Ok(if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
