mod build;
mod config;
mod parse;

pub use build::{FeedDocument, build_feed};
pub use config::FeedConfig;
pub use parse::recover_records;
