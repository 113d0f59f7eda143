use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while constructing or validating an episode record
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Audio file not found: {0}")]
    AudioFileNotFound(PathBuf),

    #[error("No audio file (.mp3/.wav) found in episode directory {0}")]
    NoAudioInDirectory(PathBuf),

    #[error("Failed to read audio file {path}: {source}")]
    AudioReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio file {path} is empty")]
    EmptyAudioFile { path: PathBuf },

    #[error("Unsupported audio extension '{extension}' for {path}")]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("Invalid slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    #[error("Episode '{slug}' has an empty title")]
    EmptyTitle { slug: String },

    #[error("Episode '{slug}' has an empty description")]
    EmptyDescription { slug: String },

    #[error("Failed to read sidecar {path}: {source}")]
    SidecarReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse sidecar {path}: {source}")]
    SidecarParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid publication timestamp '{value}' for '{slug}'")]
    InvalidPubDate { slug: String, value: String },

    #[error("Invalid base URL '{base_url}': {source}")]
    InvalidBaseUrl {
        base_url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors raised while assembling the feed document
#[derive(Error, Debug)]
pub enum BuildError {
    /// Two records share a guid. Re-submitting an already-published guid
    /// must fail the build rather than silently duplicate the entry.
    #[error("Duplicate episode guid '{guid}'")]
    DuplicateGuid { guid: String },

    #[error("Duplicate episode slug '{slug}'")]
    DuplicateSlug { slug: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Transport-level errors from the blob store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Store request failed for {key}: {source}")]
    Request {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors raised by the retrying uploader
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read local file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload of {key} failed after {attempts} attempts: {source}")]
    AttemptsExhausted {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

/// Errors raised by the atomic feed publisher. The previously published
/// document is intact in every case.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to write temporary object {temp_key}: {source}")]
    TempWriteFailed {
        temp_key: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to copy {temp_key} onto {final_key}: {source}")]
    CopyFailed {
        temp_key: String,
        final_key: String,
        #[source]
        source: StoreError,
    },
}

/// Errors raised while talking to the episode listing endpoint
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Credential rejected: {reason}")]
    AuthRejected { reason: String },

    #[error("Listing request failed: {source}")]
    RequestFailed {
        #[source]
        source: reqwest::Error,
    },

    #[error("Listing endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },
}

/// Errors that abort verification before the polling budget is spent.
/// Transient listing failures are not among them; they count as a missed
/// attempt and polling continues.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Authentication failed while verifying guid '{guid}': {reason}")]
    Authentication { guid: String, reason: String },
}

/// Errors recovering previously published episodes from the feed object
#[derive(Error, Debug)]
pub enum FeedRecoveryError {
    #[error("Failed to fetch published feed {key}: {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to parse published feed {key}: {source}")]
    ParseFailed {
        key: String,
        #[source]
        source: rss::Error,
    },
}

/// Top-level errors for a publish run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Feed build error: {0}")]
    Build(#[from] BuildError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Feed recovery error: {0}")]
    FeedRecovery(#[from] FeedRecoveryError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),
}
