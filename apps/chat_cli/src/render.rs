//! Plain-text rendering of the session for the terminal.

use client_core::{SessionEvent, SessionPhase, SessionState, UploadStatus};
use shared::{
    domain::{Message, Role},
    protocol::HealthResponse,
};

pub const HELP: &str = "\
Type a question and press enter.
  /follow <n>     ask follow-up question n of the last answer
  /upload <path>  replace the resume with a PDF file
  /health         show backend status
  /status         show session state
  /help           show this help
  /quit           leave";

pub fn message(message: &Message) -> String {
    let speaker = match (message.role, message.is_error) {
        (Role::User, _) => "you",
        (Role::Assistant, false) => "assistant",
        (Role::Assistant, true) => "assistant [error]",
    };
    let mut out = format!("{speaker}> {}", message.content);

    if !message.sections().is_empty() {
        out.push_str("\n  relevant sections: ");
        out.push_str(&message.sections().join(", "));
    }
    if !message.follow_ups().is_empty() {
        out.push_str("\n  follow-up questions:");
        for (idx, question) in message.follow_ups().iter().enumerate() {
            out.push_str(&format!("\n    {}. {question}", idx + 1));
        }
    }
    out
}

pub fn phase(state: &SessionState) -> String {
    match state.phase() {
        SessionPhase::Initializing => "Initializing...".to_string(),
        SessionPhase::Ready => "Ready".to_string(),
        SessionPhase::Sending => "Thinking...".to_string(),
        SessionPhase::InitFailed { reason } => format!("Initialization error: {reason}"),
    }
}

pub fn upload_status(status: &UploadStatus) -> String {
    if status.is_success() {
        format!("[ok] {}", status.message())
    } else {
        format!("[error] {}", status.message())
    }
}

pub fn health(health: &HealthResponse) -> String {
    format!(
        "backend status: {} (vector store: {}, resume file: {})",
        health.status,
        present(health.vectordb_exists),
        present(health.resume_exists)
    )
}

fn present(flag: bool) -> &'static str {
    if flag {
        "present"
    } else {
        "missing"
    }
}

/// Terminal line for a session event. User messages are not echoed since the
/// user just typed them.
pub fn event(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Initialized => Some(
            "Ready. Ask questions about the resume (/help for commands).".to_string(),
        ),
        SessionEvent::InitializationFailed(reason) => {
            Some(format!("Initialization error: {reason}"))
        }
        SessionEvent::MessageAppended(appended) if appended.role == Role::Assistant => {
            Some(message(appended))
        }
        SessionEvent::MessageAppended(_) => None,
        SessionEvent::SendingChanged(_) => None,
        SessionEvent::UploadStarted { filename } => Some(format!("uploading {filename}...")),
        SessionEvent::UploadFinished(status) => Some(upload_status(status)),
        SessionEvent::Closed => None,
    }
}
