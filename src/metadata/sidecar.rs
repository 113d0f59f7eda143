use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::episode::{EpisodeType, Explicitness};
use crate::error::ValidationError;

/// Filename of the sidecar document colocated with an episode's audio file
pub const SIDECAR_FILENAME: &str = "episode_data.json";

/// Structured metadata colocated with an audio file in directory
/// submission mode. Every field is optional; anything absent is derived
/// from the slug or left at its feed default. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeSidecar {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RFC 3339 publication timestamp overriding the slug-derived date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    /// Explicit guid override; immutable once published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_type: Option<EpisodeType>,
    /// Image file colocated in the episode directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_image: Option<String>,
    /// Absolute image URL, used when no colocated image exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itunes_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itunes_subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itunes_keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itunes_explicit: Option<Explicitness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_url: Option<String>,
}

/// Read a sidecar document from an episode directory.
///
/// Returns the default (all-absent) sidecar when the file does not exist;
/// an unreadable or malformed file is a validation error.
pub fn read_sidecar(episode_dir: &Path) -> Result<EpisodeSidecar, ValidationError> {
    let path = episode_dir.join(SIDECAR_FILENAME);
    if !path.exists() {
        return Ok(EpisodeSidecar::default());
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| ValidationError::SidecarReadFailed {
            path: path.clone(),
            source: e,
        })?;

    serde_json::from_str(&content)
        .map_err(|e| ValidationError::SidecarParseFailed { path, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_sidecar_yields_default() {
        let dir = tempdir().unwrap();
        let sidecar = read_sidecar(dir.path()).unwrap();
        assert!(sidecar.title.is_none());
        assert!(sidecar.guid.is_none());
        assert!(sidecar.itunes_keywords.is_none());
    }

    #[test]
    fn reads_full_sidecar() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SIDECAR_FILENAME),
            r#"{
                "title": "Automation Pipeline",
                "description": "How we automated the release train",
                "pub_date": "2025-06-18T09:30:00Z",
                "guid": "custom-guid",
                "duration_seconds": 1800,
                "season": 2,
                "episode_number": 5,
                "episode_type": "bonus",
                "itunes_keywords": ["automation", "ci"],
                "itunes_explicit": "clean"
            }"#,
        )
        .unwrap();

        let sidecar = read_sidecar(dir.path()).unwrap();
        assert_eq!(sidecar.title.as_deref(), Some("Automation Pipeline"));
        assert_eq!(sidecar.guid.as_deref(), Some("custom-guid"));
        assert_eq!(sidecar.duration_seconds, Some(1800));
        assert_eq!(sidecar.season, Some(2));
        assert_eq!(sidecar.episode_number, Some(5));
        assert_eq!(sidecar.episode_type, Some(EpisodeType::Bonus));
        assert_eq!(sidecar.itunes_explicit, Some(Explicitness::Clean));
        assert_eq!(
            sidecar.itunes_keywords,
            Some(vec!["automation".to_string(), "ci".to_string()])
        );
    }

    #[test]
    fn ignores_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SIDECAR_FILENAME),
            r#"{"title": "Ep", "some_future_field": 42}"#,
        )
        .unwrap();

        let sidecar = read_sidecar(dir.path()).unwrap();
        assert_eq!(sidecar.title.as_deref(), Some("Ep"));
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SIDECAR_FILENAME), "{not json").unwrap();

        let result = read_sidecar(dir.path());
        assert!(matches!(
            result,
            Err(ValidationError::SidecarParseFailed { .. })
        ));
    }

    #[test]
    fn negative_duration_is_rejected_by_parsing() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SIDECAR_FILENAME),
            r#"{"duration_seconds": -10}"#,
        )
        .unwrap();

        assert!(read_sidecar(dir.path()).is_err());
    }
}
