// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::ListingError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// One episode as reported by the external listing
#[derive(Debug, Clone)]
pub struct ListedEpisode {
    pub id: String,
    pub name: String,
    pub description: String,
    pub spotify_url: Option<String>,
}

/// One page of the external episode listing
#[derive(Debug, Clone)]
pub struct EpisodePage {
    pub items: Vec<ListedEpisode>,
    /// URL of the next page, if the listing continues
    pub next: Option<String>,
}

/// Read access to an external episode listing, for verification
#[async_trait]
pub trait EpisodeListing: Send + Sync {
    async fn list_episodes(
        &self,
        show_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<EpisodePage, ListingError>;
}

/// OAuth credentials for the Spotify Web API refresh-token flow
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl SpotifyCredentials {
    /// Read credentials from `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`
    /// and `SPOTIFY_REFRESH_TOKEN`. Returns `None` unless all three are set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            client_id: std::env::var("SPOTIFY_CLIENT_ID").ok()?,
            client_secret: std::env::var("SPOTIFY_CLIENT_SECRET").ok()?,
            refresh_token: std::env::var("SPOTIFY_REFRESH_TOKEN").ok()?,
        })
    }
}

/// Spotify Web API client backed by a long-lived refresh token.
///
/// Access tokens are short-lived, so the client caches the current one and
/// re-runs the refresh flow exactly once when a request comes back with
/// 401. A second rejection is reported as a credential problem rather than
/// retried.
pub struct SpotifyClient {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
    access_token: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct EpisodesResponse {
    // Spotify reports episodes unavailable in the request market as null
    items: Vec<Option<EpisodeItem>>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct EpisodeItem {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self::with_client(reqwest::Client::new(), credentials)
    }

    pub fn with_client(http: reqwest::Client, credentials: SpotifyCredentials) -> Self {
        Self {
            http,
            credentials,
            access_token: Mutex::new(None),
        }
    }

    /// Exchange the refresh token for a fresh access token
    async fn refresh_access_token(&self) -> Result<String, ListingError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ListingError::RequestFailed { source })?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(ListingError::AuthRejected {
                reason: format!("token refresh rejected with HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(ListingError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|source| ListingError::RequestFailed { source })?;
        Ok(token.access_token)
    }

    async fn current_token(&self) -> Result<String, ListingError> {
        let mut guard = self.access_token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.refresh_access_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.access_token.lock().await = None;
    }

    async fn fetch_page(
        &self,
        url: &str,
        token: &str,
    ) -> Result<reqwest::Response, ListingError> {
        self.http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| ListingError::RequestFailed { source })
    }
}

#[async_trait]
impl EpisodeListing for SpotifyClient {
    async fn list_episodes(
        &self,
        show_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<EpisodePage, ListingError> {
        let url = format!(
            "{API_BASE}/shows/{show_id}/episodes?limit={limit}&offset={offset}&market=US"
        );

        let token = self.current_token().await?;
        let mut response = self.fetch_page(&url, &token).await?;

        if response.status().as_u16() == 401 {
            // Stale access token; refresh once and retry the same page
            self.invalidate_token().await;
            let token = self.current_token().await?;
            response = self.fetch_page(&url, &token).await?;
            if response.status().as_u16() == 401 {
                return Err(ListingError::AuthRejected {
                    reason: "request rejected after token refresh".to_string(),
                });
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let page: EpisodesResponse = response
            .json()
            .await
            .map_err(|source| ListingError::RequestFailed { source })?;

        Ok(EpisodePage {
            items: page
                .items
                .into_iter()
                .flatten()
                .map(|item| ListedEpisode {
                    id: item.id,
                    name: item.name,
                    description: item.description,
                    spotify_url: item.external_urls.spotify,
                })
                .collect(),
            next: page.next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episodes_response_skips_null_items() {
        let json = r#"{
            "items": [
                {
                    "id": "abc123",
                    "name": "20250618-automation-pipeline",
                    "description": "repo-1a2b3c4-20250618-automation-pipeline",
                    "external_urls": {"spotify": "https://open.spotify.com/episode/abc123"}
                },
                null
            ],
            "next": "https://api.spotify.com/v1/shows/x/episodes?offset=50&limit=50"
        }"#;

        let page: EpisodesResponse = serde_json::from_str(json).unwrap();
        let items: Vec<_> = page.items.into_iter().flatten().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "abc123");
        assert_eq!(
            items[0].external_urls.spotify.as_deref(),
            Some("https://open.spotify.com/episode/abc123")
        );
        assert!(page.next.is_some());
    }

    #[test]
    fn episodes_response_tolerates_missing_fields() {
        let json = r#"{"items": [{"id": "abc123", "name": "Episode"}], "next": null}"#;

        let page: EpisodesResponse = serde_json::from_str(json).unwrap();
        let items: Vec<_> = page.items.into_iter().flatten().collect();
        assert_eq!(items[0].description, "");
        assert!(items[0].external_urls.spotify.is_none());
        assert!(page.next.is_none());
    }

    #[test]
    fn credentials_require_all_three_variables() {
        // Only exercise the constructor shape; env-dependent paths are
        // covered by the polling tests through a stub listing.
        let creds = SpotifyCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let _client = SpotifyClient::new(creds);
    }
}
