use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::episode::Explicitness;
use crate::error::ValidationError;

/// Feed-level configuration, read-only for the duration of a run.
///
/// Passed explicitly into the feed builder so builds stay pure and
/// testable; never modelled as shared process state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub title: String,
    pub description: String,
    /// Public site link for the channel; defaults to the base URL
    pub link: Option<String>,
    pub language: String,
    pub author: String,
    pub email: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub explicit: Explicitness,
    /// Feed-level cover image; item images fall back to this
    pub image_url: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "Untitled Podcast".to_string(),
            description: "A podcast".to_string(),
            link: None,
            language: "en".to_string(),
            author: "Unknown".to_string(),
            email: "podcast@example.com".to_string(),
            category: "Technology".to_string(),
            subcategory: None,
            explicit: Explicitness::No,
            image_url: None,
        }
    }
}

impl FeedConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ValidationError::SidecarReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        serde_json::from_str(&content).map_err(|e| ValidationError::SidecarParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
