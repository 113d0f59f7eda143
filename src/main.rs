use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};

use podpush::{
    AudioInfo, FeedConfig, IndexVerifier, NoopReporter, ProgressEvent, ProgressReporter,
    PublishOptions, PublishOutcome, RebuildOutcome, S3BlobStore, SharedProgressReporter,
    SpotifyClient, SpotifyCredentials, TokioSleeper, UploadOptions, VerifyOptions, VerifyTarget,
    publish_episode, rebuild_feed,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static FEED: Emoji<'_, '_> = Emoji("📡 ", "[~] ");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[?] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");

/// Publish podcast episodes to object storage and keep the RSS feed current
#[derive(Parser, Debug)]
#[command(name = "podpush")]
#[command(about = "Publish podcast episodes to object storage and keep the RSS feed current")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish one episode: upload its audio and replace the feed
    Publish {
        /// Audio file, or an episode directory whose name is the slug
        input: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Spotify show id to verify the published guid against
        #[arg(long)]
        show_id: Option<String>,

        /// Verification attempts before giving up
        #[arg(long, default_value = "10")]
        verify_attempts: u32,

        /// Seconds between verification attempts
        #[arg(long, default_value = "30")]
        verify_interval: u64,
    },

    /// Rebuild the feed from every episode directory and replace it
    Rebuild {
        /// Directory containing one subdirectory per episode
        episodes_dir: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Check whether a guid is visible in the external episode listing
    Verify {
        /// The episode guid to look for
        guid: String,

        /// Spotify show id to search
        #[arg(long)]
        show_id: String,

        /// Attempts before giving up
        #[arg(long, default_value = "10")]
        max_attempts: u32,

        /// Seconds between attempts
        #[arg(long, default_value = "30")]
        poll_interval: u64,

        /// Write key=value result lines to this file
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
}

/// Arguments shared by the publishing subcommands
#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// S3 bucket the feed and audio live in
    #[arg(long)]
    bucket: String,

    /// Public base URL the bucket is served under
    #[arg(long)]
    base_url: String,

    /// Repository revision the episode guid is derived from
    #[arg(long)]
    revision: String,

    /// Storage key of the feed document
    #[arg(long, default_value = podpush::DEFAULT_FEED_KEY)]
    feed_key: String,

    /// Feed channel configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write key=value result lines to this file
    #[arg(long)]
    output_file: Option<PathBuf>,
}

/// Progress reporter rendering events on a single spinner line
struct ConsoleReporter {
    bar: ProgressBar,
}

impl ConsoleReporter {
    fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RecordReady { slug, title, guid } => {
                self.bar.println(format!(
                    "{MICROPHONE}{} {}",
                    title.bold().green(),
                    format!("({slug})").dimmed()
                ));
                self.bar.println(format!("   guid: {}", guid.cyan()));
            }

            ProgressEvent::UploadStarting { key, size_bytes } => {
                self.bar.set_message(format!(
                    "{UPLOAD}Uploading {} ({})",
                    key.cyan(),
                    format_bytes(size_bytes)
                ));
            }

            ProgressEvent::UploadAttemptFailed {
                attempt,
                max_attempts,
                error,
                wait_seconds,
            } => {
                self.bar.println(format!(
                    "{WARNING}Upload attempt {attempt}/{max_attempts} failed: {} (retrying in {wait_seconds}s)",
                    error.red()
                ));
            }

            ProgressEvent::UploadCompleted { key, attempts } => {
                let attempts_note = if attempts > 1 {
                    format!(" after {attempts} attempts")
                } else {
                    String::new()
                };
                self.bar
                    .println(format!("{SUCCESS}Uploaded {}{attempts_note}", key.cyan()));
            }

            ProgressEvent::CollectingPublished { key } => {
                self.bar
                    .set_message(format!("{FEED}Reading published feed {}", key.cyan()));
            }

            ProgressEvent::PublishedCollected { episode_count } => {
                self.bar.set_message(format!(
                    "{FEED}{} published episodes recovered",
                    episode_count.to_string().cyan()
                ));
            }

            ProgressEvent::FeedAssembled {
                episode_count,
                size_bytes,
            } => {
                self.bar.set_message(format!(
                    "{FEED}Feed assembled: {} episodes, {}",
                    episode_count.to_string().cyan(),
                    format_bytes(size_bytes as u64)
                ));
            }

            ProgressEvent::PublishStarting { key } => {
                self.bar
                    .set_message(format!("{FEED}Replacing {}", key.cyan()));
            }

            ProgressEvent::PublishCompleted { feed_url } => {
                self.bar
                    .println(format!("{SUCCESS}Feed live at {}", feed_url.cyan()));
            }

            ProgressEvent::TempCleanupFailed { temp_key, error } => {
                self.bar.println(format!(
                    "{WARNING}Could not remove staging object {}: {}",
                    temp_key.yellow(),
                    error.dimmed()
                ));
            }

            ProgressEvent::VerificationAttempt {
                attempt,
                max_attempts,
            } => {
                self.bar.set_message(format!(
                    "{SEARCH}Checking listing (attempt {attempt}/{max_attempts})"
                ));
            }

            ProgressEvent::VerificationWaiting {
                attempt,
                wait_seconds,
            } => {
                self.bar.set_message(format!(
                    "{SEARCH}Not listed yet after attempt {attempt}, next check in {wait_seconds}s"
                ));
            }

            ProgressEvent::VerificationSucceeded {
                attempts,
                elapsed_seconds,
                external_url,
            } => {
                self.bar.finish_and_clear();
                let location = external_url
                    .map(|url| format!(" at {}", url.cyan()))
                    .unwrap_or_default();
                println!(
                    "{PARTY}{} after {} attempts ({elapsed_seconds}s){location}",
                    "Episode listed".bold().green(),
                    attempts.to_string().cyan()
                );
            }

            ProgressEvent::VerificationExhausted {
                attempts,
                elapsed_seconds,
            } => {
                self.bar.finish_and_clear();
                println!(
                    "{WARNING}{} after {attempts} attempts ({elapsed_seconds}s); indexing may simply be slow",
                    "Not listed yet".bold().yellow()
                );
            }
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

fn load_feed_config(path: Option<&PathBuf>) -> Result<FeedConfig> {
    match path {
        Some(path) => FeedConfig::from_file(path)
            .with_context(|| format!("Failed to load feed config {}", path.display())),
        None => Ok(FeedConfig::default()),
    }
}

fn publish_options(target: &TargetArgs, verify: Option<VerifyTarget>) -> Result<PublishOptions> {
    Ok(PublishOptions {
        revision: target.revision.clone(),
        base_url: target.base_url.clone(),
        feed_key: target.feed_key.clone(),
        feed_config: load_feed_config(target.config.as_ref())?,
        upload: UploadOptions::default(),
        verify,
    })
}

fn write_output_file(path: &PathBuf, lines: &[(&str, String)]) -> Result<()> {
    let mut content = String::new();
    for (key, value) in lines {
        content.push_str(key);
        content.push('=');
        content.push_str(value);
        content.push('\n');
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file {}", path.display()))
}

fn publish_output_lines(outcome: &PublishOutcome) -> Vec<(&'static str, String)> {
    let mut lines = vec![
        ("slug", outcome.slug.clone()),
        ("title", outcome.title.clone()),
        ("guid", outcome.guid.clone()),
        ("audio_url", outcome.audio_url.clone()),
        ("feed_url", outcome.feed_url.clone()),
        ("episode_count", outcome.episode_count.to_string()),
        ("upload_attempts", outcome.upload_attempts.to_string()),
        ("status", outcome.status.as_str().to_string()),
    ];
    if let Some(url) = &outcome.spotify_url {
        lines.push(("spotify_url", url.clone()));
    }
    lines
}

async fn run_publish(
    input: PathBuf,
    target: TargetArgs,
    show_id: Option<String>,
    verify_attempts: u32,
    verify_interval: u64,
    reporter: SharedProgressReporter,
) -> Result<()> {
    let verify = match &show_id {
        Some(show_id) => Some(VerifyTarget {
            show_id: show_id.clone(),
            options: VerifyOptions {
                max_attempts: verify_attempts,
                poll_interval: Duration::from_secs(verify_interval),
            },
        }),
        None => None,
    };

    let listing = if show_id.is_some() {
        let credentials = SpotifyCredentials::from_env();
        let Some(credentials) = credentials else {
            bail!(
                "Verification requested but SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET \
                 and SPOTIFY_REFRESH_TOKEN are not all set"
            );
        };
        Some(SpotifyClient::new(credentials))
    } else {
        None
    };

    let options = publish_options(&target, verify)?;
    let store = S3BlobStore::from_env(&target.bucket).await;

    let outcome = publish_episode(
        &store,
        &input,
        &AudioInfo::default(),
        &options,
        listing
            .as_ref()
            .map(|l| l as &dyn podpush::EpisodeListing),
        &TokioSleeper,
        &reporter,
    )
    .await
    .context("Failed to publish episode")?;

    let lines = publish_output_lines(&outcome);
    if let Some(path) = &target.output_file {
        write_output_file(path, &lines)?;
    }

    println!();
    for (key, value) in &lines {
        println!("  {} {}", format!("{key}:").dimmed(), value);
    }
    println!();

    Ok(())
}

async fn run_rebuild(
    episodes_dir: PathBuf,
    target: TargetArgs,
    reporter: SharedProgressReporter,
) -> Result<()> {
    let options = publish_options(&target, None)?;
    let store = S3BlobStore::from_env(&target.bucket).await;

    let outcome: RebuildOutcome = rebuild_feed(&store, &episodes_dir, &options, &reporter)
        .await
        .context("Failed to rebuild feed")?;

    if !outcome.skipped.is_empty() {
        println!("\n{}", "Skipped directories:".yellow().bold());
        for (name, reason) in &outcome.skipped {
            println!("  {} - {}", name.yellow(), reason.dimmed());
        }
    }

    let lines = vec![
        ("feed_url", outcome.feed_url.clone()),
        ("episode_count", outcome.episode_count.to_string()),
        ("skipped_count", outcome.skipped.len().to_string()),
    ];
    if let Some(path) = &target.output_file {
        write_output_file(path, &lines)?;
    }

    println!(
        "\n{PARTY}{} {} episodes at {}\n",
        "Feed rebuilt:".bold().green(),
        outcome.episode_count.to_string().cyan(),
        outcome.feed_url.cyan()
    );

    Ok(())
}

async fn run_verify(
    guid: String,
    show_id: String,
    max_attempts: u32,
    poll_interval: u64,
    output_file: Option<PathBuf>,
    reporter: SharedProgressReporter,
) -> Result<()> {
    let credentials = SpotifyCredentials::from_env().context(
        "SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REFRESH_TOKEN must be set",
    )?;
    let client = SpotifyClient::new(credentials);

    let report = IndexVerifier::new(&client, &show_id, &guid)
        .with_options(VerifyOptions {
            max_attempts,
            poll_interval: Duration::from_secs(poll_interval),
        })
        .run(&TokioSleeper, &reporter)
        .await
        .context("Verification failed")?;

    let status = if report.state.is_found() {
        "verified"
    } else {
        "unverified"
    };
    let mut lines = vec![
        ("guid", guid),
        ("status", status.to_string()),
        ("attempts", report.attempts.len().to_string()),
    ];
    if let Some(url) = &report.external_url {
        lines.push(("external_url", url.clone()));
    }
    if let Some(path) = &output_file {
        write_output_file(path, &lines)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(ConsoleReporter::new())
    };

    match args.command {
        Command::Publish {
            input,
            target,
            show_id,
            verify_attempts,
            verify_interval,
        } => {
            run_publish(
                input,
                target,
                show_id,
                verify_attempts,
                verify_interval,
                reporter,
            )
            .await
        }
        Command::Rebuild {
            episodes_dir,
            target,
        } => run_rebuild(episodes_dir, target, reporter).await,
        Command::Verify {
            guid,
            show_id,
            max_attempts,
            poll_interval,
            output_file,
        } => {
            run_verify(
                guid,
                show_id,
                max_attempts,
                poll_interval,
                output_file,
                reporter,
            )
            .await
        }
    }
}
