use std::path::Path;

use crate::episode::{AudioInfo, EpisodeRecord};
use crate::error::ValidationError;

/// Result of scanning an episodes directory
#[derive(Debug, Clone)]
pub struct CollectedEpisodes {
    /// Records constructed from well-formed episode directories
    pub records: Vec<EpisodeRecord>,
    /// Directories that failed validation (directory name, reason)
    pub skipped: Vec<(String, String)>,
}

/// Scan a directory of episode directories and build a record per entry.
///
/// Entries are visited in sorted order; a directory that fails validation
/// is skipped and reported so one malformed episode does not block a
/// full-feed rebuild. A missing root yields an empty collection.
pub fn collect_episode_dirs(
    episodes_dir: &Path,
    revision: &str,
    base_url: &str,
) -> Result<CollectedEpisodes, ValidationError> {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    if !episodes_dir.exists() {
        return Ok(CollectedEpisodes { records, skipped });
    }

    let entries =
        std::fs::read_dir(episodes_dir).map_err(|e| ValidationError::AudioReadFailed {
            path: episodes_dir.to_path_buf(),
            source: e,
        })?;

    let mut dirs: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        match EpisodeRecord::from_episode_dir(&dir, &AudioInfo::default(), revision, base_url) {
            Ok(record) => records.push(record),
            Err(e) => skipped.push((name, e.to_string())),
        }
    }

    Ok(CollectedEpisodes { records, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_episode_dir(root: &Path, slug: &str) {
        let dir = root.join(slug);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("episode.mp3"), b"audio").unwrap();
    }

    #[test]
    fn missing_root_yields_empty_collection() {
        let dir = tempdir().unwrap();
        let collected = collect_episode_dirs(
            &dir.path().join("episodes"),
            "abc1234",
            "https://cdn.example.com",
        )
        .unwrap();
        assert!(collected.records.is_empty());
        assert!(collected.skipped.is_empty());
    }

    #[test]
    fn collects_valid_directories_in_order() {
        let root = tempdir().unwrap();
        make_episode_dir(root.path(), "20250620-second-episode");
        make_episode_dir(root.path(), "20250618-first-episode");

        let collected =
            collect_episode_dirs(root.path(), "abc1234", "https://cdn.example.com").unwrap();

        assert_eq!(collected.records.len(), 2);
        assert_eq!(
            collected.records[0].slug.as_str(),
            "20250618-first-episode"
        );
        assert_eq!(
            collected.records[1].slug.as_str(),
            "20250620-second-episode"
        );
        assert!(collected.skipped.is_empty());
    }

    #[test]
    fn skips_malformed_directories() {
        let root = tempdir().unwrap();
        make_episode_dir(root.path(), "20250618-good-episode");
        // Bad slug
        make_episode_dir(root.path(), "not-a-slug");
        // No audio inside
        std::fs::create_dir(root.path().join("20250619-empty-episode")).unwrap();

        let collected =
            collect_episode_dirs(root.path(), "abc1234", "https://cdn.example.com").unwrap();

        assert_eq!(collected.records.len(), 1);
        assert_eq!(collected.records[0].slug.as_str(), "20250618-good-episode");
        assert_eq!(collected.skipped.len(), 2);
    }

    #[test]
    fn ignores_loose_files_in_root() {
        let root = tempdir().unwrap();
        make_episode_dir(root.path(), "20250618-good-episode");
        std::fs::write(root.path().join("legacy.mp3"), b"audio").unwrap();

        let collected =
            collect_episode_dirs(root.path(), "abc1234", "https://cdn.example.com").unwrap();
        assert_eq!(collected.records.len(), 1);
        assert!(collected.skipped.is_empty());
    }
}
