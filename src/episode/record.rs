// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::episode::Slug;
use crate::error::ValidationError;
use crate::metadata::read_sidecar;

/// Length of the revision prefix baked into derived guids
const REVISION_PREFIX_LEN: usize = 7;

/// Default season for records without an explicit one
pub const DEFAULT_SEASON: u32 = 1;

/// iTunes episode type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeType {
    Full,
    Trailer,
    Bonus,
}

impl EpisodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Trailer => "trailer",
            Self::Bonus => "bonus",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "full" => Some(Self::Full),
            "trailer" => Some(Self::Trailer),
            "bonus" => Some(Self::Bonus),
            _ => None,
        }
    }
}

/// iTunes explicitness marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Explicitness {
    Yes,
    No,
    Clean,
}

impl Explicitness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Clean => "clean",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "clean" => Some(Self::Clean),
            _ => None,
        }
    }
}

/// Trusted audio probe input. Tag extraction from raw bytes happens
/// upstream; this struct is what the pipeline receives.
#[derive(Debug, Clone, Default)]
pub struct AudioInfo {
    pub duration_seconds: u64,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Canonical in-memory representation of one published or pending episode.
///
/// Immutable after construction except for the late-bound `spotify_url`,
/// which is set only after successful external verification. The guid is
/// the de-duplication and external-lookup key and must never change once
/// published.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    pub slug: Slug,
    pub title: String,
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub duration_seconds: u64,
    pub file_size_bytes: u64,
    /// Audio file extension without the dot (`mp3` or `wav`)
    pub extension: String,
    pub audio_url: Url,
    pub guid: String,
    pub spotify_url: Option<Url>,

    // iTunes extension fields
    pub season: Option<u32>,
    pub episode_number: Option<u32>,
    pub episode_type: EpisodeType,
    pub image_url: Option<Url>,
    pub summary: Option<String>,
    pub subtitle: Option<String>,
    pub keywords: Vec<String>,
    pub explicit: Explicitness,
}

impl EpisodeRecord {
    /// Construct a record from a flat audio file.
    ///
    /// The filename stem is the slug; title and description come from the
    /// trusted probe input with slug-derived fallbacks.
    pub fn from_audio_file(
        path: &Path,
        audio: &AudioInfo,
        revision: &str,
        base_url: &str,
    ) -> Result<Self, ValidationError> {
        if !path.exists() {
            return Err(ValidationError::AudioFileNotFound(path.to_path_buf()));
        }

        let extension = audio_extension(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let slug = Slug::parse(stem)?;
        let file_size_bytes = audio_file_size(path)?;

        let title = resolve_text(audio.title.as_deref(), || slug.derived_title());
        let title = non_empty(title, || ValidationError::EmptyTitle {
            slug: slug.as_str().to_string(),
        })?;
        let description = resolve_text(audio.description.as_deref(), || {
            format!("Episode: {title}")
        });
        let description = non_empty(description, || ValidationError::EmptyDescription {
            slug: slug.as_str().to_string(),
        })?;

        let pub_date = slug.publication_date();
        let guid = derive_guid(revision, &slug);
        let audio_url = join_base_url(base_url, &audio_key_for(&slug, &extension))?;

        Ok(Self {
            slug,
            title,
            description,
            pub_date,
            duration_seconds: audio.duration_seconds,
            file_size_bytes,
            extension,
            audio_url,
            guid,
            spotify_url: None,
            season: None,
            episode_number: None,
            episode_type: EpisodeType::Full,
            image_url: None,
            summary: None,
            subtitle: None,
            keywords: Vec::new(),
            explicit: Explicitness::No,
        })
    }

    /// Construct a record from an episode directory containing the audio
    /// file and an optional `episode_data.json` sidecar.
    ///
    /// The directory name is the slug. Sidecar values win over probe
    /// values, which win over slug-derived fallbacks.
    pub fn from_episode_dir(
        dir: &Path,
        audio: &AudioInfo,
        revision: &str,
        base_url: &str,
    ) -> Result<Self, ValidationError> {
        let dir_name = dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let slug = Slug::parse(dir_name)?;

        let audio_path = find_audio_file(dir)?;
        let extension = audio_extension(&audio_path)?;
        let file_size_bytes = audio_file_size(&audio_path)?;

        let sidecar = read_sidecar(dir)?;

        let title = resolve_text(
            sidecar.title.as_deref().or(audio.title.as_deref()),
            || slug.derived_title(),
        );
        let title = non_empty(title, || ValidationError::EmptyTitle {
            slug: slug.as_str().to_string(),
        })?;
        let description = resolve_text(
            sidecar.description.as_deref().or(audio.description.as_deref()),
            || format!("Episode: {title}"),
        );
        let description = non_empty(description, || ValidationError::EmptyDescription {
            slug: slug.as_str().to_string(),
        })?;

        let pub_date = match &sidecar.pub_date {
            Some(value) => DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ValidationError::InvalidPubDate {
                    slug: slug.as_str().to_string(),
                    value: value.clone(),
                })?,
            None => slug.publication_date(),
        };

        let guid = match sidecar.guid.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => explicit.to_string(),
            _ => derive_guid(revision, &slug),
        };

        let audio_url = join_base_url(base_url, &audio_key_for(&slug, &extension))?;

        // Colocated image wins over an absolute image URL
        let image_url = match &sidecar.episode_image {
            Some(filename) if dir.join(filename).exists() => {
                Some(join_base_url(base_url, &asset_key_for(&slug, filename))?)
            }
            _ => sidecar
                .episode_image_url
                .as_deref()
                .and_then(|u| Url::parse(u).ok()),
        };

        Ok(Self {
            slug,
            title,
            description,
            pub_date,
            duration_seconds: sidecar.duration_seconds.unwrap_or(audio.duration_seconds),
            file_size_bytes,
            extension,
            audio_url,
            guid,
            spotify_url: sidecar.spotify_url.as_deref().and_then(|u| Url::parse(u).ok()),
            season: sidecar.season,
            episode_number: sidecar.episode_number,
            episode_type: sidecar.episode_type.unwrap_or(EpisodeType::Full),
            image_url,
            summary: sidecar.itunes_summary,
            subtitle: sidecar.itunes_subtitle,
            keywords: sidecar.itunes_keywords.unwrap_or_default(),
            explicit: sidecar.itunes_explicit.unwrap_or(Explicitness::No),
        })
    }

    /// Storage key of this record's audio blob,
    /// `podcast/{year}/{slug}.{extension}`
    pub fn audio_key(&self) -> String {
        audio_key_for(&self.slug, &self.extension)
    }

    /// Storage key for an asset colocated with this episode
    pub fn asset_key(&self, filename: &str) -> String {
        asset_key_for(&self.slug, filename)
    }

    /// Record the external URL discovered during verification
    pub fn set_spotify_url(&mut self, url: Url) {
        self.spotify_url = Some(url);
    }
}

/// Derive a guid from a revision identifier and slug:
/// `repo-{rev7}-{slug}`
pub fn derive_guid(revision: &str, slug: &Slug) -> String {
    // Character-based so an unusual revision string cannot split a
    // multi-byte character
    let short: String = revision.chars().take(REVISION_PREFIX_LEN).collect();
    format!("repo-{short}-{slug}")
}

/// Locate the audio file inside an episode directory.
///
/// Picks the lexicographically first `.mp3`/`.wav` so repeated runs over
/// the same directory are deterministic.
pub fn find_audio_file(dir: &Path) -> Result<PathBuf, ValidationError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ValidationError::AudioReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| is_audio_extension(ext))
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ValidationError::NoAudioInDirectory(dir.to_path_buf()))
}

fn audio_key_for(slug: &Slug, extension: &str) -> String {
    format!("podcast/{}/{}.{}", slug.year(), slug, extension)
}

fn asset_key_for(slug: &Slug, filename: &str) -> String {
    format!("podcast/{}/{}/{}", slug.year(), slug, filename)
}

fn is_audio_extension(ext: &str) -> bool {
    matches!(ext.to_lowercase().as_str(), "mp3" | "wav")
}

fn audio_extension(path: &Path) -> Result<String, ValidationError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if !is_audio_extension(&extension) {
        return Err(ValidationError::UnsupportedExtension {
            path: path.to_path_buf(),
            extension,
        });
    }
    Ok(extension)
}

fn audio_file_size(path: &Path) -> Result<u64, ValidationError> {
    let size = std::fs::metadata(path)
        .map_err(|e| ValidationError::AudioReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    if size == 0 {
        return Err(ValidationError::EmptyAudioFile {
            path: path.to_path_buf(),
        });
    }
    Ok(size)
}

fn resolve_text(explicit: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match explicit {
        Some(value) => value.trim().to_string(),
        None => fallback(),
    }
}

fn non_empty(
    value: String,
    error: impl FnOnce() -> ValidationError,
) -> Result<String, ValidationError> {
    if value.is_empty() {
        Err(error())
    } else {
        Ok(value)
    }
}

fn join_base_url(base_url: &str, key: &str) -> Result<Url, ValidationError> {
    Url::parse(&format!("{}/{}", base_url.trim_end_matches('/'), key)).map_err(|e| {
        ValidationError::InvalidBaseUrl {
            base_url: base_url.to_string(),
            source: e,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASE_URL: &str = "https://cdn.example.com";
    const REVISION: &str = "abc1234def5678";

    fn write_audio(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"fake audio bytes").unwrap();
        path
    }

    #[test]
    fn flat_file_record_derives_everything_from_slug() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), "20250618-automation-pipeline.mp3");

        let record =
            EpisodeRecord::from_audio_file(&path, &AudioInfo::default(), REVISION, BASE_URL)
                .unwrap();

        assert_eq!(record.slug.as_str(), "20250618-automation-pipeline");
        assert_eq!(record.title, "Automation Pipeline");
        assert_eq!(record.description, "Episode: Automation Pipeline");
        assert_eq!(record.guid, "repo-abc1234-20250618-automation-pipeline");
        assert_eq!(
            record.audio_url.as_str(),
            "https://cdn.example.com/podcast/2025/20250618-automation-pipeline.mp3"
        );
        assert_eq!(
            record.audio_key(),
            "podcast/2025/20250618-automation-pipeline.mp3"
        );
        assert_eq!(record.file_size_bytes, 16);
        assert_eq!(record.episode_type, EpisodeType::Full);
        assert_eq!(record.explicit, Explicitness::No);
        assert!(record.season.is_none());
        assert!(record.episode_number.is_none());
    }

    #[test]
    fn flat_file_record_uses_probe_tags() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), "20250618-automation-pipeline.mp3");

        let audio = AudioInfo {
            duration_seconds: 1830,
            title: Some("The Automation Pipeline".to_string()),
            description: Some("A deep dive".to_string()),
        };
        let record = EpisodeRecord::from_audio_file(&path, &audio, REVISION, BASE_URL).unwrap();

        assert_eq!(record.title, "The Automation Pipeline");
        assert_eq!(record.description, "A deep dive");
        assert_eq!(record.duration_seconds, 1830);
    }

    #[test]
    fn empty_probe_title_fails_validation() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), "20250618-automation-pipeline.mp3");

        let audio = AudioInfo {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        let result = EpisodeRecord::from_audio_file(&path, &audio, REVISION, BASE_URL);
        assert!(matches!(result, Err(ValidationError::EmptyTitle { .. })));
    }

    #[test]
    fn malformed_filename_fails_validation() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), "not-a-dated-slug.mp3");

        let result =
            EpisodeRecord::from_audio_file(&path, &AudioInfo::default(), REVISION, BASE_URL);
        assert!(matches!(result, Err(ValidationError::InvalidSlug { .. })));
    }

    #[test]
    fn empty_audio_file_fails_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20250618-automation-pipeline.mp3");
        std::fs::write(&path, b"").unwrap();

        let result =
            EpisodeRecord::from_audio_file(&path, &AudioInfo::default(), REVISION, BASE_URL);
        assert!(matches!(result, Err(ValidationError::EmptyAudioFile { .. })));
    }

    #[test]
    fn unsupported_extension_fails_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20250618-automation-pipeline.ogg");
        std::fs::write(&path, b"ogg bytes").unwrap();

        let result =
            EpisodeRecord::from_audio_file(&path, &AudioInfo::default(), REVISION, BASE_URL);
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn directory_record_reads_sidecar() {
        let root = tempdir().unwrap();
        let dir = root.path().join("20250618-automation-pipeline");
        std::fs::create_dir(&dir).unwrap();
        write_audio(&dir, "episode.mp3");
        std::fs::write(
            dir.join("episode_data.json"),
            r#"{
                "title": "Automation Pipeline",
                "description": "How we automated releases",
                "pub_date": "2025-06-18T09:30:00Z",
                "duration_seconds": 1800,
                "season": 1,
                "episode_number": 4,
                "episode_type": "bonus",
                "itunes_explicit": "clean"
            }"#,
        )
        .unwrap();

        let record =
            EpisodeRecord::from_episode_dir(&dir, &AudioInfo::default(), REVISION, BASE_URL)
                .unwrap();

        assert_eq!(record.slug.as_str(), "20250618-automation-pipeline");
        assert_eq!(record.title, "Automation Pipeline");
        assert_eq!(record.pub_date.to_rfc3339(), "2025-06-18T09:30:00+00:00");
        assert_eq!(record.duration_seconds, 1800);
        assert_eq!(record.season, Some(1));
        assert_eq!(record.episode_number, Some(4));
        assert_eq!(record.episode_type, EpisodeType::Bonus);
        assert_eq!(record.explicit, Explicitness::Clean);
        // Derived guid since the sidecar does not override it
        assert_eq!(record.guid, "repo-abc1234-20250618-automation-pipeline");
    }

    #[test]
    fn directory_record_without_sidecar_uses_fallbacks() {
        let root = tempdir().unwrap();
        let dir = root.path().join("20250618-automation-pipeline");
        std::fs::create_dir(&dir).unwrap();
        write_audio(&dir, "episode.wav");

        let record =
            EpisodeRecord::from_episode_dir(&dir, &AudioInfo::default(), REVISION, BASE_URL)
                .unwrap();

        assert_eq!(record.title, "Automation Pipeline");
        assert_eq!(record.extension, "wav");
        assert_eq!(record.pub_date.to_rfc3339(), "2025-06-18T00:00:00+00:00");
        assert_eq!(
            record.audio_url.as_str(),
            "https://cdn.example.com/podcast/2025/20250618-automation-pipeline.wav"
        );
    }

    #[test]
    fn directory_record_guid_override() {
        let root = tempdir().unwrap();
        let dir = root.path().join("20250618-automation-pipeline");
        std::fs::create_dir(&dir).unwrap();
        write_audio(&dir, "episode.mp3");
        std::fs::write(dir.join("episode_data.json"), r#"{"guid": "my-stable-guid"}"#).unwrap();

        let record =
            EpisodeRecord::from_episode_dir(&dir, &AudioInfo::default(), REVISION, BASE_URL)
                .unwrap();
        assert_eq!(record.guid, "my-stable-guid");
    }

    #[test]
    fn directory_record_colocated_image_wins() {
        let root = tempdir().unwrap();
        let dir = root.path().join("20250618-automation-pipeline");
        std::fs::create_dir(&dir).unwrap();
        write_audio(&dir, "episode.mp3");
        std::fs::write(dir.join("cover.jpg"), b"jpeg bytes").unwrap();
        std::fs::write(
            dir.join("episode_data.json"),
            r#"{
                "episode_image": "cover.jpg",
                "episode_image_url": "https://elsewhere.example.com/cover.png"
            }"#,
        )
        .unwrap();

        let record =
            EpisodeRecord::from_episode_dir(&dir, &AudioInfo::default(), REVISION, BASE_URL)
                .unwrap();
        assert_eq!(
            record.image_url.as_ref().unwrap().as_str(),
            "https://cdn.example.com/podcast/2025/20250618-automation-pipeline/cover.jpg"
        );
    }

    #[test]
    fn directory_without_audio_fails() {
        let root = tempdir().unwrap();
        let dir = root.path().join("20250618-automation-pipeline");
        std::fs::create_dir(&dir).unwrap();

        let result =
            EpisodeRecord::from_episode_dir(&dir, &AudioInfo::default(), REVISION, BASE_URL);
        assert!(matches!(
            result,
            Err(ValidationError::NoAudioInDirectory(_))
        ));
    }

    #[test]
    fn short_revision_is_used_whole() {
        let slug = Slug::parse("20250618-ep-one").unwrap();
        assert_eq!(derive_guid("ab12", &slug), "repo-ab12-20250618-ep-one");
        assert_eq!(
            derive_guid("abcdef0123456789", &slug),
            "repo-abcdef0-20250618-ep-one"
        );
    }

    #[test]
    fn non_ascii_revision_truncates_by_character() {
        let slug = Slug::parse("20250618-ep-one").unwrap();
        assert_eq!(
            derive_guid("rélease-candidate", &slug),
            "repo-rélease-20250618-ep-one"
        );
    }

    #[test]
    fn find_audio_file_is_deterministic() {
        let root = tempdir().unwrap();
        let dir = root.path().join("20250618-ep");
        std::fs::create_dir(&dir).unwrap();
        write_audio(&dir, "b-take.mp3");
        write_audio(&dir, "a-take.mp3");

        let found = find_audio_file(&dir).unwrap();
        assert_eq!(found.file_name().unwrap(), "a-take.mp3");
    }
}
