use std::path::Path;

use crate::error::ClientError;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A resume file staged for `/reload`.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ResumeUpload {
    pub fn new(filename: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type,
            bytes,
        }
    }

    /// Reads `path` and guesses its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("resume")
            .to_string();
        let mime_type = mime_guess::from_path(path).first_raw().map(str::to_string);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::UploadRead {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(filename, mime_type, bytes))
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type.as_deref().is_some_and(|mime| {
            mime.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case(PDF_MIME_TYPE)
        })
    }
}
