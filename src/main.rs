mod app;
mod candidates;
mod config;
mod input;
mod lyrics;
mod nowplaying;
mod playback;
mod player;
mod search;
mod server;
mod store;

use anyhow::Context;
use candidates::{OutcomeReport, OutcomeStatus, QueueRequest, Resolver};
use clap::{Args, Parser, Subcommand};
use playback::{HttpQueueSource, QueueSource, TrackIdentity};
use search::YouTubeSearch;
use std::sync::Arc;
use store::StoreHandle;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "backdrop",
    version,
    about = "Music video backdrop for whatever you're listening to"
)]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct TrackArgs {
    #[arg(long)]
    artist: String,
    #[arg(long)]
    track: String,
    /// Defaults to `playback.user_id` from the config.
    #[arg(long)]
    user: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show videos for the current track (default). Follows Last.fm unless a track is given.
    Play {
        #[arg(long, requires = "track")]
        artist: Option<String>,
        #[arg(long, requires = "artist")]
        track: Option<String>,
    },
    /// Print the candidate queue for a track as JSON.
    Resolve {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// Record how a video played for a track.
    Report {
        #[command(flatten)]
        track: TrackArgs,
        #[arg(long)]
        video_id: String,
        /// Mark the video as unplayable instead of working.
        #[arg(long)]
        failed: bool,
    },
    /// Print lyrics for a track.
    Lyrics {
        #[arg(long)]
        artist: String,
        #[arg(long)]
        track: String,
        /// Ask one provider only: strict, fuzzy or ovh.
        #[arg(long)]
        provider: Option<String>,
    },
    /// Print the search-friendly form of a track title.
    Clean { title: String },
    /// Serve the HTTP API (`GET`/`POST /api/video`).
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command.unwrap_or(Command::Play {
        artist: None,
        track: None,
    }) {
        Command::Play { artist, track } => {
            let feed = match (artist, track) {
                (Some(artist), Some(track)) => app::TrackFeed::Fixed(TrackIdentity {
                    artist,
                    track,
                    user_id: cfg.playback.user_id.clone(),
                }),
                _ => {
                    let (Some(key), Some(user)) =
                        (cfg.lastfm.api_key.as_deref(), cfg.lastfm.username.as_deref())
                    else {
                        anyhow::bail!(
                            "set lastfm.api_key and lastfm.username in the config, \
                             or pass --artist and --track"
                        );
                    };
                    app::TrackFeed::Lastfm(nowplaying::LastfmClient::new(key, user)?)
                }
            };
            match cfg.server.url.clone() {
                Some(url) => {
                    let source = HttpQueueSource::new(&url)?;
                    app::App::new(cfg, source).run(feed).await?;
                }
                None => {
                    let source = local_resolver(&cfg)?;
                    app::App::new(cfg, source).run(feed).await?;
                }
            }
        }
        Command::Resolve { track } => {
            let request = queue_request(&cfg, track);
            let response = match cfg.server.url.as_deref() {
                Some(url) => HttpQueueSource::new(url)?.fetch_queue(&request).await?,
                None => local_resolver(&cfg)?.fetch_queue(&request).await?,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Report {
            track,
            video_id,
            failed,
        } => {
            let request = queue_request(&cfg, track);
            let mut report = OutcomeReport::success(&request, &video_id);
            if failed {
                report.status = Some(OutcomeStatus::Failed);
            }
            match cfg.server.url.as_deref() {
                Some(url) => HttpQueueSource::new(url)?.report(&report).await?,
                None => local_resolver(&cfg)?.report(&report).await?,
            }
            println!(
                "Recorded {} as {}.",
                video_id,
                if failed { "failed" } else { "working" }
            );
        }
        Command::Lyrics {
            artist,
            track,
            provider,
        } => {
            let providers = match provider {
                Some(name) => vec![name.parse::<lyrics::LyricsProvider>()?],
                None => lyrics::LyricsProvider::CHAIN.to_vec(),
            };
            let client = lyrics::LyricsClient::new(&cfg.lyrics.lrclib_url, &cfg.lyrics.ovh_url)?;
            let found = client.find(&artist, &track, &providers).await;
            let Some(parsed) = found.as_ref().and_then(|(_, record)| lyrics::to_parsed(record))
            else {
                anyhow::bail!("no lyrics found for {artist} - {track}");
            };
            if let Some((source, _)) = found {
                tracing::info!("lyrics from {source:?}");
            }
            if parsed.instrumental {
                println!("(instrumental)");
            }
            for line in &parsed.lines {
                if parsed.synced {
                    let secs = line.time_ms / 1000;
                    let centis = (line.time_ms % 1000) / 10;
                    println!("[{:02}:{:02}.{centis:02}] {}", secs / 60, secs % 60, line.text);
                } else {
                    println!("{}", line.text);
                }
            }
        }
        Command::Clean { title } => {
            println!("{}", candidates::title::clean_track_title(&title));
        }
        Command::Serve => {
            let addr = cfg.server_addr()?;
            let resolver = Arc::new(local_resolver(&cfg)?);
            server::serve(resolver, addr).await?;
        }
    }

    Ok(())
}

fn local_resolver(cfg: &config::Config) -> anyhow::Result<Resolver<YouTubeSearch>> {
    if cfg.youtube.api_key.is_none() {
        tracing::warn!("no YouTube API key configured; only cached candidates are available");
    }
    let provider = YouTubeSearch::new(cfg.youtube.api_key.clone(), cfg.youtube.max_results)?;
    Ok(Resolver::new(StoreHandle::new(cfg.db_path()), provider))
}

fn queue_request(cfg: &config::Config, args: TrackArgs) -> QueueRequest {
    QueueRequest {
        artist: args.artist,
        track: args.track,
        user_id: args.user.or_else(|| cfg.playback.user_id.clone()),
    }
}
