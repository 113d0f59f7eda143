use bytes::Bytes;

use crate::error::PublishError;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::store::{BlobStore, PutOptions};

/// Suffix appended to the final key for the staging object
const TEMP_SUFFIX: &str = ".new";

/// Replace the feed object without a window of partial visibility.
///
/// The new document is first written to a staging key next to the final
/// one, then copied onto the final key in a single server-side operation.
/// Readers of the final key see either the previous document or the new
/// one, never a truncated write. The staging object is deleted afterwards
/// on a best-effort basis; a failed delete leaves a harmless orphan and
/// does not fail the publish.
pub async fn publish_atomic<S: BlobStore>(
    store: &S,
    content: Bytes,
    final_key: &str,
    reporter: &SharedProgressReporter,
) -> Result<(), PublishError> {
    let temp_key = format!("{final_key}{TEMP_SUFFIX}");

    reporter.report(ProgressEvent::PublishStarting {
        key: final_key.to_string(),
    });

    store
        .put_object(&temp_key, content, &PutOptions::feed())
        .await
        .map_err(|source| PublishError::TempWriteFailed {
            temp_key: temp_key.clone(),
            source,
        })?;

    if let Err(source) = store.copy_object(&temp_key, final_key).await {
        // The final object is untouched; clean up the staging copy if we can
        cleanup_temp(store, &temp_key, reporter).await;
        return Err(PublishError::CopyFailed {
            temp_key,
            final_key: final_key.to_string(),
            source,
        });
    }

    cleanup_temp(store, &temp_key, reporter).await;
    Ok(())
}

async fn cleanup_temp<S: BlobStore>(
    store: &S,
    temp_key: &str,
    reporter: &SharedProgressReporter,
) {
    if let Err(e) = store.delete_object(temp_key).await {
        reporter.report(ProgressEvent::TempCleanupFailed {
            temp_key: temp_key.to_string(),
            error: e.to_string(),
        });
    }
}
