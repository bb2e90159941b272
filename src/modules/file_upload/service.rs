use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::file_upload::{
    model::{SelectedFile, UploadConfig},
    storage::BlobStorage,
};
use crate::modules::message::schema::Attachment;

/// Turns a selected file into an [`Attachment`]: store the bytes, then issue a long-lived
/// signed URL. Either both happen or the caller gets an error and nothing is left behind.
#[derive(Clone)]
pub struct AttachmentUploader {
    storage: Arc<dyn BlobStorage>,
    config: UploadConfig,
}

impl AttachmentUploader {
    pub fn new(storage: Arc<dyn BlobStorage>, config: UploadConfig) -> Self {
        Self { storage, config }
    }

    fn validate_file(&self, file: &SelectedFile) -> Result<(), error::SystemError> {
        if file.bytes.is_empty() {
            return Err(error::SystemError::bad_request("File is empty"));
        }

        if file.bytes.len() > self.config.max_file_size {
            return Err(error::SystemError::bad_request(format!(
                "File size exceeds maximum allowed size of {} bytes",
                self.config.max_file_size
            )));
        }

        Ok(())
    }

    /// `{conversation_id}/{uuid}.{ext}`, unique per upload.
    fn object_path(conversation_id: Uuid, file: &SelectedFile) -> String {
        let id = Uuid::now_v7();
        match file.extension() {
            Some(ext) => format!("{}/{}.{}", conversation_id, id, ext.to_ascii_lowercase()),
            None => format!("{}/{}", conversation_id, id),
        }
    }

    pub async fn upload(
        &self,
        conversation_id: Uuid,
        file: &SelectedFile,
    ) -> Result<Attachment, error::SystemError> {
        self.validate_file(file)?;

        let path = Self::object_path(conversation_id, file);
        self.storage.upload(&path, file.bytes.clone(), &file.content_type).await?;

        let url = match self.storage.create_signed_url(&path, self.config.signed_url_ttl).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Signing {} failed, removing the stored object: {}", path, e);
                if let Err(cleanup) = self.storage.remove(&path).await {
                    tracing::error!("Could not remove orphaned object {}: {}", path, cleanup);
                }
                return Err(e);
            }
        };

        tracing::info!("Uploaded {} as {} ({} bytes)", file.name, path, file.size());

        Ok(Attachment {
            url,
            kind: file.kind,
            size: file.size(),
            name: file.name.clone(),
            storage_path: path,
        })
    }

    /// Remove an uploaded object that will never be referenced by a message.
    pub async fn discard(&self, attachment: &Attachment) {
        if let Err(e) = self.storage.remove(&attachment.storage_path).await {
            tracing::warn!("Could not discard {}: {}", attachment.storage_path, e);
        }
    }
}
