//! Chat session state and its transitions.
//!
//! Everything here is synchronous and free of I/O; [`crate::ChatSession`]
//! drives these transitions around the backend calls.

use shared::domain::{Message, Role};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Initializing,
    Ready,
    InitFailed {
        reason: String,
    },
    /// An `/ask` call is outstanding.
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("a question is already being answered")]
    AlreadySending,
    #[error("session is not initialized")]
    NotInitialized,
    #[error("session is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UploadRejected {
    #[error("an upload is already in progress")]
    AlreadyUploading,
    #[error("session is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Reloaded { message: String },
    /// Refused before any request was made.
    Rejected { reason: String },
    Failed { reason: String },
}

impl UploadStatus {
    pub fn message(&self) -> &str {
        match self {
            Self::Reloaded { message } => message,
            Self::Rejected { reason } | Self::Failed { reason } => reason,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Reloaded { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    phase: SessionPhase,
    transcript: Vec<Message>,
    pending_input: String,
    uploading: bool,
    last_upload: Option<UploadStatus>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_initializing(&self) -> bool {
        self.phase == SessionPhase::Initializing
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.phase, SessionPhase::Ready | SessionPhase::Sending)
    }

    pub fn init_error(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::InitFailed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.phase == SessionPhase::Sending
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn last_upload(&self) -> Option<&UploadStatus> {
        self.last_upload.as_ref()
    }

    /// Records the initialization outcome. Returns `false` when the outcome
    /// was already decided, in which case nothing changes.
    pub fn finish_initialization(&mut self, outcome: Result<(), String>) -> bool {
        if !self.is_initializing() {
            return false;
        }
        self.phase = match outcome {
            Ok(()) => SessionPhase::Ready,
            Err(reason) => SessionPhase::InitFailed { reason },
        };
        true
    }

    /// Gates a question and, when accepted, appends the user message, clears
    /// the pending input and enters `Sending`. Returns the question to send.
    pub fn begin_send(&mut self, text: &str) -> Result<String, SendRejected> {
        if text.trim().is_empty() {
            return Err(SendRejected::EmptyQuestion);
        }
        match self.phase {
            SessionPhase::Ready => {}
            SessionPhase::Sending => return Err(SendRejected::AlreadySending),
            SessionPhase::Initializing | SessionPhase::InitFailed { .. } => {
                return Err(SendRejected::NotInitialized)
            }
        }

        let question = text.to_string();
        self.transcript.push(Message::user(question.clone()));
        self.pending_input.clear();
        self.phase = SessionPhase::Sending;
        Ok(question)
    }

    /// Appends the assistant reply and leaves `Sending`. Ignored outside
    /// `Sending`.
    pub fn finish_send(&mut self, reply: Message) -> Option<&Message> {
        if !self.is_sending() {
            return None;
        }
        self.phase = SessionPhase::Ready;
        self.transcript.push(reply);
        self.transcript.last()
    }

    /// Leaves `Sending` without recording a reply.
    pub fn abandon_send(&mut self) {
        if self.is_sending() {
            self.phase = SessionPhase::Ready;
        }
    }

    pub fn begin_upload(&mut self) -> Result<(), UploadRejected> {
        if self.uploading {
            return Err(UploadRejected::AlreadyUploading);
        }
        self.uploading = true;
        Ok(())
    }

    pub fn finish_upload(&mut self, status: UploadStatus) {
        self.uploading = false;
        self.last_upload = Some(status);
    }

    /// Records a client-side rejection without touching an upload in flight.
    pub fn reject_upload(&mut self, reason: impl Into<String>) -> UploadStatus {
        let status = UploadStatus::Rejected {
            reason: reason.into(),
        };
        self.last_upload = Some(status.clone());
        status
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.transcript
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// Copies follow-up `index` (zero-based) of the latest assistant answer
    /// into the pending input.
    pub fn use_follow_up(&mut self, index: usize) -> Option<&str> {
        let question = self
            .last_assistant_message()?
            .follow_ups()
            .get(index)?
            .clone();
        self.pending_input = question;
        Some(&self.pending_input)
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
