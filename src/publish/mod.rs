mod atomic;
mod upload;

pub use atomic::publish_atomic;
pub use upload::{UploadOptions, UploadOutcome, upload_with_retry};
