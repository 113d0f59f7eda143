use std::time::Duration;

use bytes::Bytes;

use crate::error::{StoreError, UploadError};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::store::{BlobStore, PutOptions};
use crate::time::Sleeper;

/// Options for a retried upload
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
    /// Base unit for exponential backoff between attempts
    pub backoff_unit: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Result of a successful retried upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub key: String,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Upload a blob with bounded retries and exponential backoff.
///
/// Every attempt writes the full body with identical destination options
/// and then reads the stored size back; a size that disagrees with the
/// body counts as a failed attempt. The destination key is either fully
/// written and confirmed by a successful attempt or never finalized, so no
/// partial state survives a failed run. After failed attempt `i` (0-based)
/// the uploader waits `2^i` backoff units. Exhausting the budget surfaces
/// the last underlying store error.
pub async fn upload_with_retry<S: BlobStore>(
    store: &S,
    key: &str,
    body: Bytes,
    opts: &PutOptions,
    upload_opts: &UploadOptions,
    sleeper: &dyn Sleeper,
    reporter: &SharedProgressReporter,
) -> Result<UploadOutcome, UploadError> {
    let max_attempts = upload_opts.max_attempts.max(1);
    let expected_size = body.len() as u64;

    reporter.report(ProgressEvent::UploadStarting {
        key: key.to_string(),
        size_bytes: expected_size,
    });

    let mut attempt = 0;
    loop {
        let result = match store.put_object(key, body.clone(), opts).await {
            Ok(()) => confirm_stored_size(store, key, expected_size).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                reporter.report(ProgressEvent::UploadCompleted {
                    key: key.to_string(),
                    attempts: attempt + 1,
                });
                return Ok(UploadOutcome {
                    key: key.to_string(),
                    attempts: attempt + 1,
                });
            }
            Err(e) if attempt + 1 == max_attempts => {
                return Err(UploadError::AttemptsExhausted {
                    key: key.to_string(),
                    attempts: max_attempts,
                    source: e,
                });
            }
            Err(e) => {
                let wait = upload_opts.backoff_unit * 2u32.pow(attempt);
                reporter.report(ProgressEvent::UploadAttemptFailed {
                    attempt: attempt + 1,
                    max_attempts,
                    error: e.to_string(),
                    wait_seconds: wait.as_secs(),
                });
                sleeper.sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

/// Confirm the stored object holds as many bytes as were sent
async fn confirm_stored_size<S: BlobStore>(
    store: &S,
    key: &str,
    expected: u64,
) -> Result<(), StoreError> {
    let stored = store.head_object(key).await?;
    if stored != expected {
        return Err(StoreError::Request {
            key: key.to_string(),
            source: format!("size mismatch after upload: sent {expected} bytes, stored {stored}")
                .into(),
        });
    }
    Ok(())
}
