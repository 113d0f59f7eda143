// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use chrono::Utc;

use crate::episode::{AudioInfo, CollectedEpisodes, EpisodeRecord, collect_episode_dirs};
use crate::error::{FeedRecoveryError, PipelineError, StoreError, UploadError};
use crate::feed::{FeedConfig, build_feed, recover_records};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::publish::{UploadOptions, publish_atomic, upload_with_retry};
use crate::store::{BlobStore, PutOptions};
use crate::time::Sleeper;
use crate::verify::{EpisodeListing, IndexVerifier, VerificationReport, VerifyOptions};

/// Default storage key of the published feed document
pub const DEFAULT_FEED_KEY: &str = "rss.xml";

/// Options for a publish run
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Repository revision the guid is derived from
    pub revision: String,
    /// Public base URL the audio and feed are served under
    pub base_url: String,
    /// Storage key of the feed document
    pub feed_key: String,
    pub feed_config: FeedConfig,
    pub upload: UploadOptions,
    /// External listing to verify against, when configured
    pub verify: Option<VerifyTarget>,
}

/// External show to verify the published guid against
#[derive(Debug, Clone)]
pub struct VerifyTarget {
    pub show_id: String,
    pub options: VerifyOptions,
}

/// Terminal status of a publish run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// Feed replaced, no verification requested
    Published,
    /// Feed replaced and the guid surfaced in the external listing
    PublishedVerified,
    /// Feed replaced but the polling budget ran out before the guid
    /// surfaced. Not a failure: indexing delay routinely exceeds the
    /// budget.
    PublishedUnverified,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Published => "published",
            PublishStatus::PublishedVerified => "published-verified",
            PublishStatus::PublishedUnverified => "published-unverified",
        }
    }
}

/// Result of a publish run
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub slug: String,
    pub title: String,
    pub guid: String,
    pub audio_url: String,
    pub feed_url: String,
    /// Episodes in the published document, the new one included
    pub episode_count: usize,
    pub upload_attempts: u32,
    pub status: PublishStatus,
    pub spotify_url: Option<String>,
    pub verification: Option<VerificationReport>,
}

/// Result of a full-feed rebuild
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub feed_url: String,
    pub episode_count: usize,
    /// Episode directories skipped during collection (name, reason)
    pub skipped: Vec<(String, String)>,
}

/// Publish one episode end to end.
///
/// 1. Constructs and validates the record (directory input uses the
///    sidecar, a flat file the probe input alone)
/// 2. Uploads the audio with retry, concurrently with recovering the
///    previously published episodes from the live feed document
/// 3. Assembles the merged feed; an already-published guid fails here
///    and leaves the published document unchanged
/// 4. Replaces the feed object atomically
/// 5. Optionally polls the external listing for the new guid
pub async fn publish_episode<S: BlobStore>(
    store: &S,
    input: &Path,
    audio: &AudioInfo,
    options: &PublishOptions,
    listing: Option<&dyn EpisodeListing>,
    sleeper: &dyn Sleeper,
    reporter: &SharedProgressReporter,
) -> Result<PublishOutcome, PipelineError> {
    let record = if input.is_dir() {
        EpisodeRecord::from_episode_dir(input, audio, &options.revision, &options.base_url)?
    } else {
        EpisodeRecord::from_audio_file(input, audio, &options.revision, &options.base_url)?
    };

    reporter.report(ProgressEvent::RecordReady {
        slug: record.slug.as_str().to_string(),
        title: record.title.clone(),
        guid: record.guid.clone(),
    });

    let audio_path = if input.is_dir() {
        crate::episode::find_audio_file(input)?
    } else {
        input.to_path_buf()
    };
    let body = tokio::fs::read(&audio_path)
        .await
        .map(bytes::Bytes::from)
        .map_err(|source| UploadError::FileReadFailed {
            path: audio_path.clone(),
            source,
        })?;

    // Audio upload and feed recovery touch disjoint keys
    let audio_key = record.audio_key();
    let put_opts = PutOptions::audio(&record.extension);
    let (uploaded, published) = tokio::join!(
        upload_with_retry(
            store,
            &audio_key,
            body,
            &put_opts,
            &options.upload,
            sleeper,
            reporter,
        ),
        collect_published(store, &options.feed_key, reporter),
    );
    let uploaded = uploaded?;
    let published = published?;

    if input.is_dir() {
        upload_colocated_image(store, input, &record, options, sleeper, reporter).await?;
    }

    // Published records keep their guids verbatim; the new record is
    // appended and the uniqueness guard decides whether it may enter
    let mut records = published;
    records.push(record.clone());

    let document = build_feed(&records, &options.feed_config, Utc::now())?;
    let episode_count = document.episode_count;
    reporter.report(ProgressEvent::FeedAssembled {
        episode_count,
        size_bytes: document.xml.len(),
    });

    publish_atomic(store, document.into_bytes(), &options.feed_key, reporter).await?;

    let feed_url = join_url(&options.base_url, &options.feed_key);
    reporter.report(ProgressEvent::PublishCompleted {
        feed_url: feed_url.clone(),
    });

    let mut status = PublishStatus::Published;
    let mut spotify_url = record.spotify_url.as_ref().map(|u| u.to_string());
    let mut verification = None;

    if let (Some(target), Some(listing)) = (&options.verify, listing) {
        let report = IndexVerifier::new(listing, &target.show_id, &record.guid)
            .with_options(target.options.clone())
            .run(sleeper, reporter)
            .await?;

        status = if report.state.is_found() {
            PublishStatus::PublishedVerified
        } else {
            PublishStatus::PublishedUnverified
        };
        if let Some(url) = &report.external_url {
            spotify_url = Some(url.clone());
        }
        verification = Some(report);
    }

    Ok(PublishOutcome {
        slug: record.slug.as_str().to_string(),
        title: record.title,
        guid: record.guid,
        audio_url: record.audio_url.to_string(),
        feed_url,
        episode_count,
        upload_attempts: uploaded.attempts,
        status,
        spotify_url,
        verification,
    })
}

/// Rebuild the feed from every episode directory under `episodes_dir` and
/// publish it. No audio is uploaded; the blobs are assumed to be in place
/// from earlier publish runs.
pub async fn rebuild_feed<S: BlobStore>(
    store: &S,
    episodes_dir: &Path,
    options: &PublishOptions,
    reporter: &SharedProgressReporter,
) -> Result<RebuildOutcome, PipelineError> {
    let CollectedEpisodes { records, skipped } =
        collect_episode_dirs(episodes_dir, &options.revision, &options.base_url)?;

    let document = build_feed(&records, &options.feed_config, Utc::now())?;
    let episode_count = document.episode_count;
    reporter.report(ProgressEvent::FeedAssembled {
        episode_count,
        size_bytes: document.xml.len(),
    });

    publish_atomic(store, document.into_bytes(), &options.feed_key, reporter).await?;

    let feed_url = join_url(&options.base_url, &options.feed_key);
    reporter.report(ProgressEvent::PublishCompleted {
        feed_url: feed_url.clone(),
    });

    Ok(RebuildOutcome {
        feed_url,
        episode_count,
        skipped,
    })
}

/// Recover the previously published episodes from the live feed document.
/// A missing feed object is the first publish, not an error.
pub async fn collect_published<S: BlobStore>(
    store: &S,
    feed_key: &str,
    reporter: &SharedProgressReporter,
) -> Result<Vec<EpisodeRecord>, FeedRecoveryError> {
    reporter.report(ProgressEvent::CollectingPublished {
        key: feed_key.to_string(),
    });

    let bytes = match store.get_object(feed_key).await {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound { .. }) => {
            reporter.report(ProgressEvent::PublishedCollected { episode_count: 0 });
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(FeedRecoveryError::FetchFailed {
                key: feed_key.to_string(),
                source,
            });
        }
    };

    let records = recover_records(&bytes).map_err(|source| FeedRecoveryError::ParseFailed {
        key: feed_key.to_string(),
        source,
    })?;

    reporter.report(ProgressEvent::PublishedCollected {
        episode_count: records.len(),
    });
    Ok(records)
}

/// Upload an episode image sitting next to the audio file, when the
/// sidecar references one
async fn upload_colocated_image<S: BlobStore>(
    store: &S,
    dir: &Path,
    record: &EpisodeRecord,
    options: &PublishOptions,
    sleeper: &dyn Sleeper,
    reporter: &SharedProgressReporter,
) -> Result<(), PipelineError> {
    let sidecar = crate::metadata::read_sidecar(dir)?;
    let Some(filename) = sidecar.episode_image else {
        return Ok(());
    };
    let path = dir.join(&filename);
    if !path.exists() {
        return Ok(());
    }

    let body = tokio::fs::read(&path)
        .await
        .map(bytes::Bytes::from)
        .map_err(|source| UploadError::FileReadFailed {
            path: path.clone(),
            source,
        })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/jpeg",
    };
    let opts = PutOptions {
        content_type: content_type.to_string(),
        ..PutOptions::feed()
    };

    upload_with_retry(
        store,
        &record.asset_key(&filename),
        body,
        &opts,
        &options.upload,
        sleeper,
        reporter,
    )
    .await?;
    Ok(())
}

fn join_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}
