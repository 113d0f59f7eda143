mod client;
mod poll;

pub use client::{EpisodeListing, EpisodePage, ListedEpisode, SpotifyClient, SpotifyCredentials};
pub use poll::{
    IndexVerifier, VerificationAttempt, VerificationReport, VerifyOptions, VerifyState,
};
