use std::{io::Write, path::PathBuf, process::ExitCode, sync::Arc};

use client_core::{ChatSession, ResumeUpload, SendOutcome, SessionEvent};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::TryRecvError},
};
use tracing::{debug, warn};

use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    /// One-based index as typed by the user.
    FollowUp(usize),
    Upload(PathBuf),
    Health,
    Status,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

pub fn parse_line(line: &str) -> ReplCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return ReplCommand::Ask(trimmed.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "quit" | "exit" => ReplCommand::Quit,
        "help" => ReplCommand::Help,
        "health" => ReplCommand::Health,
        "status" => ReplCommand::Status,
        "upload" if !arg.is_empty() => ReplCommand::Upload(PathBuf::from(arg)),
        "upload" => ReplCommand::Invalid("usage: /upload <path-to-pdf>".to_string()),
        "follow" => match arg.parse::<usize>() {
            Ok(n) if n > 0 => ReplCommand::FollowUp(n),
            _ => ReplCommand::Invalid("usage: /follow <n> (n starts at 1)".to_string()),
        },
        other => ReplCommand::Invalid(format!("unknown command /{other}; try /help")),
    }
}

fn drain_events(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(line) = render::event(&event) {
                    println!("{line}");
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "repl: session events lagged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn report_send(outcome: &SendOutcome) {
    if let SendOutcome::Rejected(rejected) = outcome {
        println!("(not sent: {rejected})");
    }
}

/// Interactive chat loop on stdin. Returns when stdin closes or on `/quit`.
pub async fn run(session: Arc<ChatSession>) -> anyhow::Result<ExitCode> {
    let mut events = session.subscribe();
    println!("{}", render::phase(&session.snapshot().await));
    session.initialize().await;
    drain_events(&mut events);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            ReplCommand::Ask(question) => {
                let outcome = session.send_question(&question).await;
                report_send(&outcome);
            }
            ReplCommand::FollowUp(n) => match session.use_follow_up(n - 1).await {
                Some(question) => {
                    println!("you> {question}");
                    let outcome = session.send_pending().await;
                    report_send(&outcome);
                }
                None => println!("no follow-up question #{n} on the last answer"),
            },
            ReplCommand::Upload(path) => match ResumeUpload::from_path(&path).await {
                Ok(upload) => {
                    if let Err(rejected) = session.reload_resume(upload).await {
                        println!("(upload not started: {rejected})");
                    }
                }
                Err(err) => println!("[error] {err}"),
            },
            ReplCommand::Health => match session.health().await {
                Ok(health) => println!("{}", render::health(&health)),
                Err(err) => println!("health check failed: {err}"),
            },
            ReplCommand::Status => {
                let state = session.snapshot().await;
                println!("{}", render::phase(&state));
                if let Some(status) = state.last_upload() {
                    println!("last upload: {}", render::upload_status(status));
                }
            }
            ReplCommand::Help => println!("{}", render::HELP),
            ReplCommand::Quit => break,
            ReplCommand::Empty => {}
            ReplCommand::Invalid(usage) => println!("{usage}"),
        }
        drain_events(&mut events);
    }

    debug!(session_id = %session.id(), "repl: input closed");
    session.close().await;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_questions() {
        assert_eq!(
            parse_line("  What is their degree?  \n"),
            ReplCommand::Ask("What is their degree?".to_string())
        );
        assert_eq!(parse_line("   "), ReplCommand::Empty);
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            parse_line("/upload  ./cv final.pdf"),
            ReplCommand::Upload(PathBuf::from("./cv final.pdf"))
        );
        assert_eq!(parse_line("/follow 2"), ReplCommand::FollowUp(2));
        assert_eq!(parse_line("/quit"), ReplCommand::Quit);
        assert_eq!(parse_line("/exit"), ReplCommand::Quit);
        assert_eq!(parse_line("/status"), ReplCommand::Status);
    }

    #[test]
    fn rejects_bad_command_arguments() {
        assert!(matches!(parse_line("/upload"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_line("/follow 0"), ReplCommand::Invalid(_)));
        assert!(matches!(parse_line("/follow two"), ReplCommand::Invalid(_)));
        assert_eq!(
            parse_line("/frobnicate"),
            ReplCommand::Invalid("unknown command /frobnicate; try /help".to_string())
        );
    }
}
