use std::sync::Arc;

/// Events emitted during an episode publish run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Episode record constructed and validated
    RecordReady {
        slug: String,
        title: String,
        guid: String,
    },

    /// Audio upload is starting
    UploadStarting { key: String, size_bytes: u64 },

    /// A single upload attempt failed; another attempt follows after the wait
    UploadAttemptFailed {
        attempt: u32,
        max_attempts: u32,
        error: String,
        wait_seconds: u64,
    },

    /// Audio upload succeeded
    UploadCompleted { key: String, attempts: u32 },

    /// Fetching the previously published feed document
    CollectingPublished { key: String },

    /// Previously published episodes recovered (zero on first publish)
    PublishedCollected { episode_count: usize },

    /// Feed document assembled
    FeedAssembled {
        episode_count: usize,
        size_bytes: usize,
    },

    /// Atomic replace of the feed object is starting
    PublishStarting { key: String },

    /// Feed object replaced; the new document is publicly visible
    PublishCompleted { feed_url: String },

    /// Best-effort temp cleanup after publish did not succeed
    TempCleanupFailed { temp_key: String, error: String },

    /// A verification attempt is starting
    VerificationAttempt { attempt: u32, max_attempts: u32 },

    /// Target guid not listed yet; waiting before the next attempt
    VerificationWaiting { attempt: u32, wait_seconds: u64 },

    /// Target guid found in the external listing
    VerificationSucceeded {
        attempts: u32,
        elapsed_seconds: u64,
        external_url: Option<String>,
    },

    /// Polling budget exhausted without a match
    VerificationExhausted {
        attempts: u32,
        elapsed_seconds: u64,
    },
}

/// Trait for reporting progress events during a publish run.
///
/// Implementations can render terminal output, collect statistics, or
/// forward structured events to an orchestrator.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::RecordReady {
            slug: "20250618-automation-pipeline".to_string(),
            title: "Automation Pipeline".to_string(),
            guid: "repo-abc1234-20250618-automation-pipeline".to_string(),
        });

        reporter.report(ProgressEvent::UploadStarting {
            key: "podcast/2025/20250618-automation-pipeline.mp3".to_string(),
            size_bytes: 1024,
        });

        reporter.report(ProgressEvent::UploadAttemptFailed {
            attempt: 1,
            max_attempts: 3,
            error: "connection reset".to_string(),
            wait_seconds: 1,
        });

        reporter.report(ProgressEvent::UploadCompleted {
            key: "podcast/2025/20250618-automation-pipeline.mp3".to_string(),
            attempts: 2,
        });

        reporter.report(ProgressEvent::CollectingPublished {
            key: "rss.xml".to_string(),
        });

        reporter.report(ProgressEvent::PublishedCollected { episode_count: 0 });

        reporter.report(ProgressEvent::FeedAssembled {
            episode_count: 1,
            size_bytes: 2048,
        });

        reporter.report(ProgressEvent::PublishStarting {
            key: "rss.xml".to_string(),
        });

        reporter.report(ProgressEvent::PublishCompleted {
            feed_url: "https://cdn.example.com/rss.xml".to_string(),
        });

        reporter.report(ProgressEvent::TempCleanupFailed {
            temp_key: "rss.xml.new".to_string(),
            error: "access denied".to_string(),
        });

        reporter.report(ProgressEvent::VerificationAttempt {
            attempt: 1,
            max_attempts: 10,
        });

        reporter.report(ProgressEvent::VerificationWaiting {
            attempt: 1,
            wait_seconds: 30,
        });

        reporter.report(ProgressEvent::VerificationSucceeded {
            attempts: 3,
            elapsed_seconds: 60,
            external_url: Some("https://open.spotify.com/episode/abc".to_string()),
        });

        reporter.report(ProgressEvent::VerificationExhausted {
            attempts: 10,
            elapsed_seconds: 300,
        });
    }
}
