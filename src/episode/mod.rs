mod collect;
mod record;
mod slug;

pub use collect::{CollectedEpisodes, collect_episode_dirs};
pub use record::{
    AudioInfo, DEFAULT_SEASON, EpisodeRecord, EpisodeType, Explicitness, derive_guid,
    find_audio_file,
};
pub use slug::Slug;
