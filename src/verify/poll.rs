use std::time::{Duration, Instant};

use crate::error::{ListingError, VerifyError};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::time::Sleeper;
use crate::verify::client::{EpisodeListing, ListedEpisode};

/// Listing page size per request
const PAGE_SIZE: u32 = 50;
/// Safety cap on the number of listed items scanned per attempt
const MAX_SCANNED_ITEMS: u32 = 1000;

/// Options for bounded index polling
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Verification state: starts `Pending`, ends in exactly one terminal state
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyState {
    Pending,
    Found {
        attempts_made: u32,
        elapsed: Duration,
    },
    Exhausted {
        attempts_made: u32,
        elapsed: Duration,
    },
}

impl VerifyState {
    pub fn is_found(&self) -> bool {
        matches!(self, VerifyState::Found { .. })
    }
}

/// One polling attempt as recorded in the report
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationAttempt {
    /// 1-based attempt counter
    pub attempt: u32,
    pub found: bool,
    pub elapsed_seconds: u64,
}

/// Outcome of a verification run, including the per-attempt log
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub state: VerifyState,
    pub attempts: Vec<VerificationAttempt>,
    /// Public URL of the matched episode, when the listing provides one
    pub external_url: Option<String>,
}

/// Polls an external episode listing until a guid appears or the budget
/// runs out.
///
/// Indexing delay on the listing side is expected and not an error, so a
/// miss only advances the state machine; exhaustion is a terminal state
/// the caller decides how to treat. A rejected credential fails the run
/// immediately since no amount of waiting repairs it.
pub struct IndexVerifier<'a> {
    listing: &'a dyn EpisodeListing,
    show_id: String,
    guid: String,
    options: VerifyOptions,
}

impl<'a> IndexVerifier<'a> {
    pub fn new(
        listing: &'a dyn EpisodeListing,
        show_id: impl Into<String>,
        guid: impl Into<String>,
    ) -> Self {
        Self {
            listing,
            show_id: show_id.into(),
            guid: guid.into(),
            options: VerifyOptions::default(),
        }
    }

    pub fn with_options(mut self, options: VerifyOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the polling loop to a terminal state. Consumes the verifier;
    /// terminal states are not resumable.
    pub async fn run(
        self,
        sleeper: &dyn Sleeper,
        reporter: &SharedProgressReporter,
    ) -> Result<VerificationReport, VerifyError> {
        let max_attempts = self.options.max_attempts.max(1);
        let started = Instant::now();
        let mut log = Vec::with_capacity(max_attempts as usize);

        for attempt in 1..=max_attempts {
            reporter.report(ProgressEvent::VerificationAttempt {
                attempt,
                max_attempts,
            });

            // A failed listing call is indistinguishable from "not indexed
            // yet" for our purposes, so it consumes the attempt and polling
            // continues. Only a rejected credential is unrecoverable.
            let hit = match self.find_episode().await {
                Ok(hit) => hit,
                Err(ListingError::AuthRejected { reason }) => {
                    return Err(VerifyError::Authentication {
                        guid: self.guid.clone(),
                        reason,
                    });
                }
                Err(_) => None,
            };

            let elapsed = started.elapsed();
            log.push(VerificationAttempt {
                attempt,
                found: hit.is_some(),
                elapsed_seconds: elapsed.as_secs(),
            });

            if let Some(episode) = hit {
                reporter.report(ProgressEvent::VerificationSucceeded {
                    attempts: attempt,
                    elapsed_seconds: elapsed.as_secs(),
                    external_url: episode.spotify_url.clone(),
                });
                return Ok(VerificationReport {
                    state: VerifyState::Found {
                        attempts_made: attempt,
                        elapsed,
                    },
                    attempts: log,
                    external_url: episode.spotify_url,
                });
            }

            if attempt < max_attempts {
                reporter.report(ProgressEvent::VerificationWaiting {
                    attempt,
                    wait_seconds: self.options.poll_interval.as_secs(),
                });
                sleeper.sleep(self.options.poll_interval).await;
            }
        }

        let elapsed = started.elapsed();
        reporter.report(ProgressEvent::VerificationExhausted {
            attempts: max_attempts,
            elapsed_seconds: elapsed.as_secs(),
        });
        Ok(VerificationReport {
            state: VerifyState::Exhausted {
                attempts_made: max_attempts,
                elapsed,
            },
            attempts: log,
            external_url: None,
        })
    }

    /// Scan the listing page by page for the target guid
    async fn find_episode(&self) -> Result<Option<ListedEpisode>, ListingError> {
        let mut offset = 0;
        while offset < MAX_SCANNED_ITEMS {
            let page = self
                .listing
                .list_episodes(&self.show_id, PAGE_SIZE, offset)
                .await?;

            let page_len = page.items.len();
            for episode in page.items {
                if self.matches(&episode) {
                    return Ok(Some(episode));
                }
            }

            if page.next.is_none() || page_len == 0 {
                break;
            }
            offset += PAGE_SIZE;
        }
        Ok(None)
    }

    /// The guid is planted in the feed item, so a listing that ingested the
    /// episode surfaces it as the id, the title, or inside the description.
    fn matches(&self, episode: &ListedEpisode) -> bool {
        episode.id == self.guid
            || episode.name == self.guid
            || episode.description.contains(&self.guid)
    }
}
