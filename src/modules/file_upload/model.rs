use actix_web::web::Bytes;
use std::path::Path;
use std::time::Duration;

use crate::constants::DEFAULT_SIGNED_URL_TTL;
use crate::modules::chat::model::FileSummary;
use crate::modules::message::schema::AttachmentKind;

/// Attachment upload configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,
    pub signed_url_ttl: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024, // 25MB
            signed_url_ttl: Duration::from_secs(DEFAULT_SIGNED_URL_TTL),
        }
    }
}

/// A file the user picked for the next message, held locally until it is sent or cleared.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub kind: AttachmentKind,
    pub bytes: Bytes,
}

impl SelectedFile {
    /// The declared content type wins; otherwise it is guessed from the file name.
    pub fn new(name: impl Into<String>, content_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty() && ct != "application/octet-stream")
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());
        let kind = AttachmentKind::from_mime(&content_type);
        Self { name, content_type, kind, bytes: bytes.into() }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|ext| ext.to_str()).filter(|ext| !ext.is_empty())
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary { name: self.name.clone(), size: self.size(), kind: self.kind }
    }
}
