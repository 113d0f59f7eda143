// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use rss::extension::itunes::{
    ITunesCategoryBuilder, ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder,
    ITunesOwnerBuilder,
};
use rss::{
    ChannelBuilder, EnclosureBuilder, GuidBuilder, ImageBuilder, Item, ItemBuilder,
};

use crate::episode::{DEFAULT_SEASON, EpisodeRecord, EpisodeType};
use crate::error::BuildError;
use crate::feed::FeedConfig;
use crate::store::content_type_for_extension;

/// A complete, standards-valid feed document.
///
/// Derived wholesale from the full record set on every publish; never
/// persisted independently of its generation.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub xml: String,
    pub episode_count: usize,
}

impl FeedDocument {
    pub fn into_bytes(self) -> bytes::Bytes {
        bytes::Bytes::from(self.xml.into_bytes())
    }
}

/// Assemble the feed document from the full set of known records.
///
/// Pure given `now`: identical inputs and a frozen clock yield a
/// byte-identical document. `now` becomes the channel's lastBuildDate and
/// is deliberately independent of any episode timestamp.
///
/// Fails without producing a document when two records share a guid or a
/// slug; the duplicate-guid check is what keeps re-submission of an
/// already-published episode from silently duplicating the entry.
pub fn build_feed(
    records: &[EpisodeRecord],
    config: &FeedConfig,
    now: DateTime<Utc>,
) -> Result<FeedDocument, BuildError> {
    check_uniqueness(records)?;

    let annotated = assign_episode_numbers(records);

    // Visible item order: newest first, slug as deterministic tie-break
    let mut ordered: Vec<&EpisodeRecord> = annotated.iter().collect();
    ordered.sort_by(|a, b| {
        b.pub_date
            .cmp(&a.pub_date)
            .then_with(|| a.slug.as_str().cmp(b.slug.as_str()))
    });

    let items: Vec<Item> = ordered.iter().map(|record| render_item(record)).collect();

    let link = config.link.clone().unwrap_or_default();

    let mut itunes_channel = ITunesChannelExtensionBuilder::default();
    itunes_channel
        .author(Some(config.author.clone()))
        .explicit(Some(config.explicit.as_str().to_string()))
        .summary(Some(config.description.clone()))
        .owner(Some(
            ITunesOwnerBuilder::default()
                .name(Some(config.author.clone()))
                .email(Some(config.email.clone()))
                .build(),
        ));

    let mut category = ITunesCategoryBuilder::default();
    category.text(config.category.clone());
    if let Some(sub) = &config.subcategory {
        category.subcategory(Some(Box::new(
            ITunesCategoryBuilder::default().text(sub.clone()).build(),
        )));
    }
    itunes_channel.categories(vec![category.build()]);

    if let Some(image_url) = &config.image_url {
        itunes_channel.image(Some(image_url.clone()));
    }

    let mut channel = ChannelBuilder::default();
    channel
        .title(config.title.clone())
        .description(config.description.clone())
        .link(link.clone())
        .language(Some(config.language.clone()))
        .last_build_date(Some(now.to_rfc2822()))
        .generator(Some(concat!("podpush ", env!("CARGO_PKG_VERSION")).to_string()))
        .managing_editor(Some(config.email.clone()))
        .webmaster(Some(config.email.clone()))
        .itunes_ext(Some(itunes_channel.build()))
        .items(items);

    if let Some(image_url) = &config.image_url {
        channel.image(Some(
            ImageBuilder::default()
                .url(image_url.clone())
                .title(config.title.clone())
                .link(link)
                .build(),
        ));
    }

    let xml = channel.build().to_string();

    Ok(FeedDocument {
        xml,
        episode_count: records.len(),
    })
}

fn check_uniqueness(records: &[EpisodeRecord]) -> Result<(), BuildError> {
    let mut guids = HashSet::new();
    let mut slugs = HashSet::new();

    for record in records {
        if !guids.insert(record.guid.as_str()) {
            return Err(BuildError::DuplicateGuid {
                guid: record.guid.clone(),
            });
        }
        if !slugs.insert(record.slug.as_str()) {
            return Err(BuildError::DuplicateSlug {
                slug: record.slug.as_str().to_string(),
            });
        }
    }
    Ok(())
}

/// Derived-annotation pass over an immutable snapshot of records.
///
/// Episode numbers depend on the whole ordered set, so they are assigned
/// here rather than at record construction. Within the default season,
/// unnumbered records receive numbers by ascending publication date,
/// starting at 1 and skipping slots explicitly claimed by other records.
/// Records in an explicit non-default season are left untouched.
fn assign_episode_numbers(records: &[EpisodeRecord]) -> Vec<EpisodeRecord> {
    let claimed: BTreeSet<u32> = records
        .iter()
        .filter(|r| r.season.unwrap_or(DEFAULT_SEASON) == DEFAULT_SEASON)
        .filter_map(|r| r.episode_number)
        .collect();

    // Auto-number candidates by ascending publication order
    let mut candidates: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.episode_number.is_none() && r.season.unwrap_or(DEFAULT_SEASON) == DEFAULT_SEASON
        })
        .map(|(i, _)| i)
        .collect();
    candidates.sort_by(|&a, &b| {
        records[a]
            .pub_date
            .cmp(&records[b].pub_date)
            .then_with(|| records[a].slug.as_str().cmp(records[b].slug.as_str()))
    });

    let mut annotated: Vec<EpisodeRecord> = records.to_vec();
    let mut next = 1u32;
    for index in candidates {
        while claimed.contains(&next) {
            next += 1;
        }
        annotated[index].episode_number = Some(next);
        next += 1;
    }

    for record in &mut annotated {
        if record.season.is_none() {
            record.season = Some(DEFAULT_SEASON);
        }
    }

    annotated
}

fn render_item(record: &EpisodeRecord) -> Item {
    let mut itunes_item = ITunesItemExtensionBuilder::default();
    itunes_item
        .duration(Some(format_duration(record.duration_seconds)))
        .explicit(Some(record.explicit.as_str().to_string()))
        .summary(Some(
            record
                .summary
                .clone()
                .unwrap_or_else(|| record.description.clone()),
        ));

    if let Some(subtitle) = &record.subtitle {
        itunes_item.subtitle(Some(subtitle.clone()));
    }
    // Item-level image only for an episode-specific override; otherwise
    // readers fall back to the channel image
    if let Some(image_url) = &record.image_url {
        itunes_item.image(Some(image_url.to_string()));
    }
    if let Some(season) = record.season {
        itunes_item.season(Some(season.to_string()));
    }
    if let Some(number) = record.episode_number {
        itunes_item.episode(Some(number.to_string()));
    }
    if record.episode_type != EpisodeType::Full {
        itunes_item.episode_type(Some(record.episode_type.as_str().to_string()));
    }
    if !record.keywords.is_empty() {
        itunes_item.keywords(Some(record.keywords.join(",")));
    }

    ItemBuilder::default()
        .title(Some(record.title.clone()))
        .description(Some(record.description.clone()))
        .guid(Some(
            GuidBuilder::default()
                .value(record.guid.clone())
                .permalink(false)
                .build(),
        ))
        .pub_date(Some(record.pub_date.to_rfc2822()))
        .link(Some(record.audio_url.to_string()))
        .enclosure(Some(
            EnclosureBuilder::default()
                .url(record.audio_url.to_string())
                .length(record.file_size_bytes.to_string())
                .mime_type(content_type_for_extension(&record.extension).to_string())
                .build(),
        ))
        .itunes_ext(Some(itunes_item.build()))
        .build()
}

/// Format a duration as zero-padded `HH:MM:SS`
fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
