use std::sync::Arc;

use shared::{domain::Message, protocol::HealthResponse};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    backend::BackendClient,
    error::{ClientError, SessionFailure},
    state::{SendRejected, SessionState, UploadRejected, UploadStatus},
    upload::ResumeUpload,
};

pub const PDF_REQUIRED_MESSAGE: &str = "Please upload a PDF file";
const UNEXPECTED_RESPONSE_MESSAGE: &str = "Backend returned an unexpected response.";
const UPLOAD_UNREACHABLE_MESSAGE: &str = "Upload failed. Make sure the backend is running.";
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Initialized,
    InitializationFailed(String),
    MessageAppended(Message),
    SendingChanged(bool),
    UploadStarted { filename: String },
    UploadFinished(UploadStatus),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized,
    Failed(SessionFailure),
    /// An earlier call already started initialization; no request was made.
    AlreadyStarted,
    /// The session was closed before the backend answered.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Answered(Message),
    /// The backend call failed; the message is the inline error entry.
    Failed(Message),
    Rejected(SendRejected),
    Discarded,
}

impl SendOutcome {
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Answered(message) | Self::Failed(message) => Some(message),
            Self::Rejected(_) | Self::Discarded => None,
        }
    }
}

struct SessionInner {
    state: SessionState,
    init_started: bool,
    closed: bool,
}

/// Client side of one conversation with the resume assistant.
///
/// Backend calls run on detached tasks: dropping a caller's future never
/// aborts a request, and the task always leaves `Sending` or `uploading`.
pub struct ChatSession {
    id: Uuid,
    backend: Arc<dyn BackendClient>,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn BackendClient>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            id: Uuid::new_v4(),
            backend,
            inner: Mutex::new(SessionInner {
                state: SessionState::new(),
                init_started: false,
                closed: false,
            }),
            events,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.inner.lock().await.state.transcript().to_vec()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub async fn initialize(self: &Arc<Self>) -> InitOutcome {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return InitOutcome::Discarded;
            }
            if inner.init_started {
                debug!(session_id = %self.id, "session: initialize ignored, already started");
                return InitOutcome::AlreadyStarted;
            }
            inner.init_started = true;
        }

        info!(session_id = %self.id, backend = self.backend.base_url(), "session: initializing");
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = session
                .backend
                .initialize()
                .await
                .map(|_| ())
                .map_err(|err| initialization_failure(&err, session.backend.base_url()));
            session.finish_initialize(result).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(session_id = %self.id, %join_err, "session: initialize task failed");
                self.finish_initialize(Err(SessionFailure::Initialization(
                    connect_failure_message(self.backend.base_url()),
                )))
                .await
            }
        }
    }

    async fn finish_initialize(&self, result: Result<(), SessionFailure>) -> InitOutcome {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            debug!(session_id = %self.id, "session: initialize result discarded after close");
            return InitOutcome::Discarded;
        }

        let recorded = inner
            .state
            .finish_initialization(result.clone().map_err(|failure| failure.message().to_string()));
        if !recorded {
            return InitOutcome::AlreadyStarted;
        }

        match result {
            Ok(()) => {
                info!(session_id = %self.id, "session: initialized");
                self.emit(SessionEvent::Initialized);
                InitOutcome::Initialized
            }
            Err(failure) => {
                warn!(
                    session_id = %self.id,
                    reason = failure.message(),
                    "session: initialization failed"
                );
                self.emit(SessionEvent::InitializationFailed(failure.message().to_string()));
                InitOutcome::Failed(failure)
            }
        }
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.inner.lock().await.state.set_pending_input(text);
    }

    pub async fn pending_input(&self) -> String {
        self.inner.lock().await.state.pending_input().to_string()
    }

    /// Fills the pending input with follow-up `index` (zero-based) of the
    /// latest answer.
    pub async fn use_follow_up(&self, index: usize) -> Option<String> {
        self.inner
            .lock()
            .await
            .state
            .use_follow_up(index)
            .map(str::to_string)
    }

    pub async fn send_pending(self: &Arc<Self>) -> SendOutcome {
        let text = self.pending_input().await;
        self.send_question(&text).await
    }

    pub async fn send_question(self: &Arc<Self>, text: &str) -> SendOutcome {
        let question = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return SendOutcome::Rejected(SendRejected::Closed);
            }
            let question = match inner.state.begin_send(text) {
                Ok(question) => question,
                Err(rejected) => {
                    debug!(session_id = %self.id, %rejected, "session: question rejected");
                    return SendOutcome::Rejected(rejected);
                }
            };
            self.emit(SessionEvent::MessageAppended(Message::user(question.clone())));
            self.emit(SessionEvent::SendingChanged(true));
            question
        };

        info!(session_id = %self.id, question_len = question.len(), "session: asking");
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let reply = session
                .backend
                .ask(&question)
                .await
                .map(Message::assistant)
                .map_err(|err| request_failure(&err, session.backend.base_url()));
            session.finish_send(reply).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(session_id = %self.id, %join_err, "session: ask task failed");
                self.finish_send(Err(SessionFailure::Request(connect_failure_message(
                    self.backend.base_url(),
                ))))
                .await
            }
        }
    }

    async fn finish_send(&self, reply: Result<Message, SessionFailure>) -> SendOutcome {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            inner.state.abandon_send();
            debug!(session_id = %self.id, "session: answer discarded after close");
            return SendOutcome::Discarded;
        }

        let (message, answered) = match reply {
            Ok(message) => (message, true),
            Err(failure) => {
                warn!(session_id = %self.id, reason = failure.message(), "session: ask failed");
                (Message::assistant_error(failure.message()), false)
            }
        };
        let Some(appended) = inner.state.finish_send(message).cloned() else {
            return SendOutcome::Discarded;
        };

        self.emit(SessionEvent::MessageAppended(appended.clone()));
        self.emit(SessionEvent::SendingChanged(false));
        if answered {
            info!(session_id = %self.id, "session: question answered");
            SendOutcome::Answered(appended)
        } else {
            SendOutcome::Failed(appended)
        }
    }

    /// Uploads a replacement resume. Non-PDF files are refused without a
    /// request.
    pub async fn reload_resume(
        self: &Arc<Self>,
        upload: ResumeUpload,
    ) -> Result<UploadStatus, UploadRejected> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(UploadRejected::Closed);
            }
            if !upload.is_pdf() {
                info!(
                    session_id = %self.id,
                    filename = %upload.filename,
                    mime_type = upload.mime_type.as_deref().unwrap_or("unknown"),
                    "session: upload refused, not a pdf"
                );
                let status = inner.state.reject_upload(PDF_REQUIRED_MESSAGE);
                self.emit(SessionEvent::UploadFinished(status.clone()));
                return Ok(status);
            }
            inner.state.begin_upload()?;
            self.emit(SessionEvent::UploadStarted {
                filename: upload.filename.clone(),
            });
        }

        info!(session_id = %self.id, filename = %upload.filename, "session: uploading resume");
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let status = match session.backend.reload(upload).await {
                Ok(response) => UploadStatus::Reloaded {
                    message: response.message,
                },
                Err(err) => UploadStatus::Failed {
                    reason: upload_failure(&err).message().to_string(),
                },
            };
            session.finish_upload(status).await
        });

        match task.await {
            Ok(status) => Ok(status),
            Err(join_err) => {
                error!(session_id = %self.id, %join_err, "session: upload task failed");
                Ok(self
                    .finish_upload(UploadStatus::Failed {
                        reason: UPLOAD_UNREACHABLE_MESSAGE.to_string(),
                    })
                    .await)
            }
        }
    }

    async fn finish_upload(&self, status: UploadStatus) -> UploadStatus {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            debug!(session_id = %self.id, "session: upload result discarded after close");
            return status;
        }
        if status.is_success() {
            info!(session_id = %self.id, "session: resume reloaded");
        } else {
            warn!(session_id = %self.id, reason = status.message(), "session: upload failed");
        }
        inner.state.finish_upload(status.clone());
        self.emit(SessionEvent::UploadFinished(status.clone()));
        status
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.backend.health().await
    }

    /// Tears the session down. Calls still in flight finish on their own and
    /// their results are dropped.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;
        info!(session_id = %self.id, "session: closed");
        self.emit(SessionEvent::Closed);
    }
}

pub fn connect_failure_message(base_url: &str) -> String {
    format!("Failed to connect to backend. Make sure it's running on {base_url}")
}

fn initialization_failure(err: &ClientError, base_url: &str) -> SessionFailure {
    let message = match err {
        ClientError::Backend { detail, .. } => detail.clone(),
        ClientError::Decode(_) => UNEXPECTED_RESPONSE_MESSAGE.to_string(),
        ClientError::Transport(_)
        | ClientError::InvalidBaseUrl { .. }
        | ClientError::UploadRead { .. } => connect_failure_message(base_url),
    };
    SessionFailure::Initialization(message)
}

fn request_failure(err: &ClientError, base_url: &str) -> SessionFailure {
    let message = match err {
        ClientError::Backend { detail, .. } => format!("Error: {detail}"),
        ClientError::Decode(_) => UNEXPECTED_RESPONSE_MESSAGE.to_string(),
        ClientError::Transport(_)
        | ClientError::InvalidBaseUrl { .. }
        | ClientError::UploadRead { .. } => format!(
            "Failed to connect to the server. Make sure the backend is running on {base_url}"
        ),
    };
    SessionFailure::Request(message)
}

fn upload_failure(err: &ClientError) -> SessionFailure {
    let message = match err.backend_detail() {
        Some(detail) => detail.to_string(),
        None if matches!(err, ClientError::Decode(_)) => UNEXPECTED_RESPONSE_MESSAGE.to_string(),
        None => UPLOAD_UNREACHABLE_MESSAGE.to_string(),
    };
    SessionFailure::Request(message)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
