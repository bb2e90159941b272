pub mod handle;
pub mod model;
pub mod route;
pub mod service;
pub mod storage;

pub use model::{SelectedFile, UploadConfig};
pub use service::AttachmentUploader;
pub use storage::LocalBlobStorage;
