mod upload_store;

pub use upload_store::{StagedUpload, UploadStore, PUBLIC_PREFIX};
