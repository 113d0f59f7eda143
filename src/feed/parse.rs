// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use url::Url;

use crate::episode::{EpisodeRecord, EpisodeType, Explicitness, Slug};

/// Recover episode records from a previously published feed document.
///
/// The published feed is the persisted source of truth for the known
/// episode set; every publish re-reads it and regenerates the document
/// wholesale. Items this pipeline did not produce (no guid, no enclosure,
/// or a non-slug audio filename) are skipped rather than guessed at.
pub fn recover_records(xml: &[u8]) -> Result<Vec<EpisodeRecord>, rss::Error> {
    let channel = rss::Channel::read_from(xml)?;

    let records = channel
        .items()
        .iter()
        .filter_map(recover_item)
        .collect();

    Ok(records)
}

fn recover_item(item: &rss::Item) -> Option<EpisodeRecord> {
    let guid = item.guid()?.value().to_string();
    let enclosure = item.enclosure()?;
    let audio_url = Url::parse(enclosure.url()).ok()?;

    // The audio key template is podcast/{year}/{slug}.{extension}
    let filename = audio_url.path_segments()?.next_back()?;
    let (stem, extension) = filename.rsplit_once('.')?;
    let slug = Slug::parse(stem).ok()?;

    let pub_date = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| slug.publication_date());

    let itunes = item.itunes_ext();

    let duration_seconds = itunes
        .and_then(|ext| ext.duration())
        .and_then(parse_duration)
        .unwrap_or(0);

    let title = item
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| slug.derived_title());
    let description = item
        .description()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Episode: {title}"));

    Some(EpisodeRecord {
        title,
        description,
        pub_date,
        duration_seconds,
        file_size_bytes: enclosure.length().parse().unwrap_or(0),
        extension: extension.to_lowercase(),
        audio_url,
        guid,
        spotify_url: None,
        season: itunes
            .and_then(|ext| ext.season())
            .and_then(|s| s.parse().ok()),
        episode_number: itunes
            .and_then(|ext| ext.episode())
            .and_then(|e| e.parse().ok()),
        episode_type: itunes
            .and_then(|ext| ext.episode_type())
            .and_then(EpisodeType::from_str_opt)
            .unwrap_or(EpisodeType::Full),
        image_url: itunes
            .and_then(|ext| ext.image())
            .and_then(|u| Url::parse(u).ok()),
        summary: itunes.and_then(|ext| ext.summary()).map(str::to_string),
        subtitle: itunes.and_then(|ext| ext.subtitle()).map(str::to_string),
        keywords: itunes
            .and_then(|ext| ext.keywords())
            .map(|k| k.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        explicit: itunes
            .and_then(|ext| ext.explicit())
            .and_then(Explicitness::from_str_opt)
            .unwrap_or(Explicitness::No),
        slug,
    })
}

/// Parse an itunes duration (`HH:MM:SS`, `MM:SS`, or plain seconds)
fn parse_duration(value: &str) -> Option<u64> {
    let mut seconds: u64 = 0;
    for part in value.split(':') {
        seconds = seconds
            .checked_mul(60)?
            .checked_add(part.parse().ok()?)?;
    }
    Some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedConfig, build_feed};
    use chrono::TimeZone;

    #[test]
    fn recovers_published_episodes() {
        // Round through the builder: what we publish we must be able to
        // collect again on the next run
        let xml = sample_document();
        let records = recover_records(xml.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.slug.as_str(), "20250618-automation-pipeline");
        assert_eq!(record.guid, "repo-abc1234-20250618-automation-pipeline");
        assert_eq!(record.duration_seconds, 1830);
        assert_eq!(record.file_size_bytes, 12_345_678);
        assert_eq!(record.extension, "mp3");
        assert_eq!(record.episode_number, Some(1));
        assert_eq!(record.season, Some(1));
    }

    fn sample_document() -> String {
        use crate::episode::AudioInfo;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let path = dir.path().join("20250618-automation-pipeline.mp3");
        std::fs::write(&path, vec![0u8; 16]).unwrap();
        let mut record = EpisodeRecord::from_audio_file(
            &path,
            &AudioInfo {
                duration_seconds: 1830,
                ..Default::default()
            },
            "abc1234",
            "https://cdn.example.com",
        )
        .unwrap();
        record.file_size_bytes = 12_345_678;

        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();
        build_feed(&[record], &FeedConfig::default(), now).unwrap().xml
    }

    #[test]
    fn skips_items_without_guid_or_enclosure() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test</title>
    <description>Test</description>
    <item>
      <title>No guid</title>
      <enclosure url="https://cdn.example.com/podcast/2025/20250618-ep-one.mp3" length="10" type="audio/mpeg"/>
    </item>
    <item>
      <title>No enclosure</title>
      <guid isPermaLink="false">some-guid</guid>
    </item>
  </channel>
</rss>"#;
        let records = recover_records(xml.as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn skips_items_with_foreign_audio_paths() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Test</title>
    <description>Test</description>
    <item>
      <guid isPermaLink="false">foreign-guid</guid>
      <enclosure url="https://elsewhere.example.com/audio/track.mp3" length="10" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;
        let records = recover_records(xml.as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(recover_records(b"this is not xml at all <<<").is_err());
    }

    #[test]
    fn parses_duration_formats() {
        assert_eq!(parse_duration("00:30:30"), Some(1830));
        assert_eq!(parse_duration("30:30"), Some(1830));
        assert_eq!(parse_duration("90"), Some(90));
        assert_eq!(parse_duration("abc"), None);
    }
}
