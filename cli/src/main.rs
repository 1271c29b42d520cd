mod progress;

use anyhow::{bail, Context, Result};
use clap::Parser;
use penguinshift::model::{DownloadFormat, Platform, PlaylistSummary};
use penguinshift::store::Config;
use penguinshift::{
    BrowserPopup, Level, LinkHandle, LinkState, Notice, Shift, ShiftError, TransferOptions,
    TransferView,
};
use progress::TransferProgress;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug, Clone)]
pub struct TransferOpts {
    /// Add to an existing playlist instead of creating a new one
    #[clap(long = "existing")]
    pub existing: bool,
    #[clap(long = "name", default_value = "")]
    pub name: String,
    #[clap(long = "description", default_value = "")]
    pub description: String,
}

#[derive(Parser, Debug, Clone)]
pub enum Command {
    #[clap(about = "choose the platform playlists are read from")]
    Source { platform: Platform },
    #[clap(about = "check whether platforms are linked")]
    Status { platform: Option<Platform> },
    #[clap(about = "link a platform through its authorization page")]
    Link { platform: Platform },
    #[clap(about = "force a fresh authorization for a platform")]
    Reconnect { platform: Platform },
    #[clap(about = "list source playlists")]
    Playlists {
        #[clap(long = "query")]
        query: Option<String>,
    },
    #[clap(about = "select or deselect source playlists")]
    Toggle {
        #[clap(required = true)]
        ids: Vec<String>,
    },
    #[clap(about = "include all tracks of every selected playlist")]
    IncludeAll {
        #[clap(long = "off")]
        off: bool,
    },
    #[clap(about = "show the stored selection")]
    Selection,
    #[clap(about = "check the destination platform and list its playlists")]
    Destination {
        #[clap(long = "link")]
        link: bool,
    },
    #[clap(about = "start a transfer and follow it")]
    Transfer(TransferOpts),
    #[clap(about = "follow a transfer until it finishes")]
    Watch { id: Option<u64> },
    #[clap(about = "download the transfer report (csv, pdf or json)")]
    Download {
        format: DownloadFormat,
        #[clap(long = "dir")]
        dir: Option<PathBuf>,
    },
    #[clap(about = "download the unmatched songs")]
    Unmatched {
        #[clap(long = "dir")]
        dir: Option<PathBuf>,
        /// Print the unmatched songs instead of saving the CSV
        #[clap(long = "json")]
        json: bool,
    },
    #[clap(about = "forget the selection and start a new transfer")]
    Reset,
    #[clap(about = "cache a session token")]
    Login { token: String },
    #[clap(about = "forget the cached session token")]
    Logout,
}

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "penguinshift",
    version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
    about = "move playlists between Spotify and YouTube Music",
)]
pub struct Opts {
    #[clap(long = "data-dir", env = "PENGUINSHIFT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
    #[clap(long = "api-base", env = "PENGUINSHIFT_API_BASE")]
    pub api_base: Option<String>,
    #[clap(long = "token", env = "PENGUINSHIFT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    #[clap(subcommand)]
    pub subcommand: Command,
}

fn print_notice(notice: Notice) {
    match notice {
        Notice::Toast {
            level: Level::Error,
            message,
        } => eprintln!("error: {}", message),
        Notice::Toast { message, .. } => println!("{}", message),
        Notice::Reconnect { platform } => eprintln!(
            "Please reconnect{}: penguinshift reconnect <platform>",
            platform
                .map(|platform| format!(" your {} account", platform.display_name()))
                .unwrap_or_default()
        ),
    }
}

fn print_playlists(playlists: &[PlaylistSummary], shift: &Shift) {
    let selection = shift.store().read();
    if playlists.is_empty() {
        println!("no playlists");
    }
    for playlist in playlists {
        let marker = if selection.is_selected(&playlist.id) {
            "x"
        } else {
            " "
        };
        println!(
            "[{}] {:<24} {} ({} songs)",
            marker, playlist.id, playlist.name, playlist.song_count
        );
    }
}

async fn wait_for_link(
    shift: &Shift,
    handle: LinkHandle,
    shutdown: &CancellationToken,
) -> LinkState {
    let platform = handle.platform();
    println!(
        "Waiting for {} authorization in your browser...",
        platform.display_name()
    );
    tokio::select! {
        _ = handle.finished() => {}
        _ = shutdown.cancelled() => handle.cancel(),
    }
    let state = shift.links().state(platform);
    println!("{}: {}", platform.display_name(), state);
    state
}

async fn watch_transfer(shift: &Shift, transfer_id: u64, shutdown: &CancellationToken) -> TransferView {
    let mut watch = shift.transfers().poll(transfer_id);
    let progress = TransferProgress::new(transfer_id);
    loop {
        tokio::select! {
            view = watch.changed() => match view {
                Some(view) if !view.is_finished() => progress.update(&view),
                _ => break,
            },
            _ = shutdown.cancelled() => {
                watch.cancel();
                break;
            }
        }
    }
    let view = watch.finished().await;
    progress.finish(&view);
    view
}

fn active_transfer(shift: &Shift, id: Option<u64>) -> Result<u64, ShiftError> {
    id.or(shift.store().read().active_transfer_id)
        .ok_or(ShiftError::NoActiveTransfer)
}

async fn run(opts: Opts, shutdown: CancellationToken) -> Result<()> {
    let data_dir = opts
        .data_dir
        .or_else(Config::default_data_dir)
        .context("no data directory available")?;
    let mut config = Config::open(&data_dir).await?;
    if let Some(api_base) = opts.api_base {
        config.api_base = api_base;
    }

    let shift = Shift::open(config, Arc::new(BrowserPopup), Arc::new(print_notice))?;
    if let Some(token) = opts.token {
        if !shift.login(&token) {
            tracing::warn!("ignoring PENGUINSHIFT_TOKEN: not a JWT");
        }
    }

    match opts.subcommand {
        Command::Source { platform } => {
            shift.playlists().switch_platform(platform);
            println!(
                "source: {}, destination: {}",
                platform.display_name(),
                platform.opposite().display_name()
            );
        }
        Command::Status { platform } => {
            let platforms = platform.map_or(Platform::ALL.to_vec(), |platform| vec![platform]);
            for platform in platforms {
                let linked = shift.links().check_link(platform).await;
                println!(
                    "{}: {}",
                    platform.display_name(),
                    if linked { "linked" } else { "not linked" }
                );
            }
        }
        Command::Link { platform } => {
            let handle = shift.links().begin_link(platform).await?;
            wait_for_link(&shift, handle, &shutdown).await;
        }
        Command::Reconnect { platform } => {
            let handle = shift.links().force_reconnect(platform).await?;
            wait_for_link(&shift, handle, &shutdown).await;
        }
        Command::Playlists { query } => {
            if !shift.playlists().check_source().await? {
                bail!("source platform is not linked, run `link` first");
            }
            let playlists = match query {
                Some(query) => shift.playlists().filter(&query),
                None => shift.playlists().playlists(),
            };
            print_playlists(&playlists, &shift);
        }
        Command::Toggle { ids } => {
            for id in ids {
                let selected = shift.playlists().toggle(&id);
                println!("{} {}", if selected { "selected" } else { "removed" }, id);
            }
        }
        Command::IncludeAll { off } => {
            shift.playlists().set_include_all(!off);
            println!("include all tracks: {}", shift.playlists().all_tracks_included());
        }
        Command::Selection => {
            println!("{}", serde_json::to_string_pretty(&shift.store().read())?);
        }
        Command::Destination { link } => {
            let destination = shift.destination();
            if link {
                let handle = destination.link().await?;
                wait_for_link(&shift, handle, &shutdown).await;
            } else if !destination.ensure_linked().await {
                bail!(
                    "{} is not linked, run `destination --link` first",
                    destination.destination().display_name()
                );
            }
            print_playlists(&destination.playlists(), &shift);
        }
        Command::Transfer(transfer) => {
            let options = TransferOptions {
                create_new: !transfer.existing,
                name: transfer.name,
                description: transfer.description,
            };
            let created = match shift.transfers().start(&options).await {
                Err(ShiftError::DestinationNotLinked(platform)) => bail!(
                    "{} is not linked, run `destination --link` first",
                    platform.display_name()
                ),
                other => other?,
            };
            println!("started transfer {}", created.id);
            watch_transfer(&shift, created.id, &shutdown).await;
        }
        Command::Watch { id } => {
            let transfer_id = active_transfer(&shift, id)?;
            watch_transfer(&shift, transfer_id, &shutdown).await;
        }
        Command::Download { format, dir } => {
            let job = shift.transfers().fetch(active_transfer(&shift, None)?).await?;
            let dir = dir.unwrap_or_else(|| shift.config().download_dir());
            let path = shift.reporter().download(&job, format, &dir).await?;
            println!("saved {}", path.display());
        }
        Command::Unmatched { dir, json } => {
            let job = shift.transfers().fetch(active_transfer(&shift, None)?).await?;
            if json {
                let unmatched = shift.reporter().unmatched_json(&job).await?;
                println!("{}", serde_json::to_string_pretty(&unmatched)?);
            } else {
                let dir = dir.unwrap_or_else(|| shift.config().download_dir());
                let path = shift.reporter().download_unmatched(&job, &dir).await?;
                println!("saved {}", path.display());
            }
        }
        Command::Reset => {
            shift.reset();
            println!("selection cleared");
        }
        Command::Login { token } => {
            if !shift.login(&token) {
                bail!("the token is not a JWT");
            }
            println!("logged in");
        }
        Command::Logout => shift.logout(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "penguinshift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let opts = Opts::parse();
    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown");
            shutdown_signal.cancel();
        }
    });

    run(opts, shutdown).await
}
