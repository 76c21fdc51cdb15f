//! Client core for the resume assistant: backend transport and the chat
//! session state machine.

pub mod backend;
pub mod error;
pub mod session;
pub mod state;
pub mod upload;

pub use backend::{BackendClient, BackendTimeouts, HttpBackend};
pub use error::{ClientError, SessionFailure};
pub use session::{ChatSession, InitOutcome, SendOutcome, SessionEvent};
pub use state::{SendRejected, SessionPhase, SessionState, UploadRejected, UploadStatus};
pub use upload::{ResumeUpload, PDF_MIME_TYPE};
