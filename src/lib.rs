pub mod episode;
pub mod error;
pub mod feed;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod store;
pub mod time;
pub mod verify;

// Re-export main types for convenience
pub use episode::{AudioInfo, EpisodeRecord, Slug, collect_episode_dirs, derive_guid};
pub use error::{
    BuildError, ListingError, PipelineError, PublishError, StoreError, UploadError,
    ValidationError, VerifyError,
};
pub use feed::{FeedConfig, FeedDocument, build_feed, recover_records};
pub use pipeline::{
    DEFAULT_FEED_KEY, PublishOptions, PublishOutcome, PublishStatus, RebuildOutcome,
    VerifyTarget, publish_episode, rebuild_feed,
};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use publish::{UploadOptions, publish_atomic, upload_with_retry};
pub use store::{BlobStore, PutOptions, S3BlobStore};
pub use time::{Sleeper, TokioSleeper};
pub use verify::{
    EpisodeListing, IndexVerifier, SpotifyClient, SpotifyCredentials, VerificationReport,
    VerifyOptions, VerifyState,
};
