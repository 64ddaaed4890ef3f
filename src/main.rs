//! Headless panorama viewer driver.
//!
//! Loads an optional initial source, then reads control lines from stdin
//! (`load`, `stereo`, `zoom`, `play`, `screenshot`, ...) until EOF or `quit`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use phovid360::config::Configuration;
use phovid360::control::{ControlInput, parse_control_line};
use phovid360::events::{LoadOutcome, LoadRequest, ViewerCommand, ViewerEvent};
use phovid360::media::{MediaFetcher, MediaSource, SourceFetcher, StereoMode, encode_texture};
use phovid360::query::parse_viewer_input;
use phovid360::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "phovid360",
    version,
    about = "Headless 360° photo and video viewer"
)]
struct Args {
    /// Initial media: a path, a URL, or a viewer query such as `?url=...&stereo=tb`
    #[arg(value_name = "SOURCE")]
    source: Option<String>,
    /// Path to YAML config
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Stereo layout of the initial source (mono, tb, lr)
    #[arg(long, value_name = "MODE", value_parser = parse_stereo)]
    stereo: Option<StereoMode>,
    /// Write every rendered sky texture to this JPEG file
    #[arg(long = "texture-out", value_name = "FILE")]
    texture_out: Option<PathBuf>,
    /// Override the screenshot directory from the config
    #[arg(long = "screenshot-dir", value_name = "DIR")]
    screenshot_dir: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn parse_stereo(raw: &str) -> Result<StereoMode, String> {
    match raw.to_ascii_lowercase().as_str() {
        "mono" | "none" | "0" => Ok(StereoMode::None),
        other => match StereoMode::from_query_value(other) {
            StereoMode::None => Err(format!("unknown stereo mode {raw:?}")),
            mode => Ok(mode),
        },
    }
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("phovid360={level},reqwest=warn,hyper=warn"))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        source,
        config,
        stereo,
        texture_out,
        screenshot_dir,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let mut cfg = match &config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(dir) = screenshot_dir {
        cfg.screenshot_dir = dir;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    debug!("configuration: {cfg:#?}");

    let fetcher: Arc<dyn MediaFetcher> =
        Arc::new(SourceFetcher::new(&cfg.user_agent).context("failed to build HTTP client")?);

    // Channels (small/bounded)
    let (command_tx, command_rx) = mpsc::channel::<ViewerCommand>(16); // External -> Viewer
    let (load_tx, load_rx) = mpsc::channel::<LoadRequest>(4); // Viewer -> Loader
    let (outcome_tx, outcome_rx) = mpsc::channel::<LoadOutcome>(4); // Loader -> Viewer
    let (event_tx, event_rx) = mpsc::channel::<ViewerEvent>(64); // Viewer -> reporter

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cancel = cancel.clone();
        let timeout = cfg.load_timeout;
        async move {
            tasks::loader::run(load_rx, outcome_tx, fetcher, cancel, timeout)
                .await
                .context("loader task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        let cfg = cfg.clone();
        async move {
            tasks::viewer::run(command_rx, outcome_rx, load_tx, event_tx, cfg, cancel)
                .await
                .context("viewer task failed")
        }
    });

    tasks.spawn({
        let quality = cfg.texture_quality;
        async move {
            report_events(event_rx, texture_out, quality).await;
            Ok(())
        }
    });

    if let Some(raw) = source {
        if let Some(cmd) = load_command(&raw, stereo).await {
            command_tx.send(cmd).await.context("viewer stopped early")?;
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        let cmd = match parse_control_line(&line) {
            Ok(None) => continue,
            Ok(Some(ControlInput::Quit)) => break,
            Ok(Some(ControlInput::Load(raw))) => match load_command(&raw, None).await {
                Some(cmd) => cmd,
                None => continue,
            },
            Ok(Some(ControlInput::Command(cmd))) => cmd,
            Err(err) => {
                warn!("{err:#}");
                continue;
            }
        };
        if command_tx.send(cmd).await.is_err() {
            break;
        }
    }
    // Viewer finishes any pending load, then the pipeline drains.
    drop(command_tx);

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    Ok(())
}

async fn load_command(raw: &str, stereo_override: Option<StereoMode>) -> Option<ViewerCommand> {
    let params = parse_viewer_input(raw);
    let Some(media) = params.media else {
        warn!("no media in {raw:?}");
        return None;
    };
    match MediaSource::resolve(&media).await {
        Ok(source) => Some(ViewerCommand::Load {
            source,
            stereo: stereo_override.unwrap_or(params.stereo),
        }),
        Err(err) => {
            warn!(error = %err, "{}", err.user_message());
            None
        }
    }
}

async fn report_events(
    mut events: mpsc::Receiver<ViewerEvent>,
    texture_out: Option<PathBuf>,
    quality: u8,
) {
    while let Some(event) = events.recv().await {
        match event {
            ViewerEvent::StateChanged(ch) => debug!(from = ?ch.from, to = ?ch.to, "state"),
            ViewerEvent::ImageRendered { texture, stereo } => {
                info!(
                    width = texture.width(),
                    height = texture.height(),
                    stereo = %stereo,
                    "sky texture updated"
                );
                if let Some(path) = &texture_out {
                    let written = tokio::task::spawn_blocking({
                        let path = path.clone();
                        move || -> Result<()> {
                            let jpeg = encode_texture(&texture, quality)?;
                            std::fs::write(&path, jpeg)
                                .with_context(|| format!("failed to write {}", path.display()))
                        }
                    })
                    .await;
                    match written {
                        Ok(Ok(())) => info!(path = %path.display(), "texture written"),
                        Ok(Err(err)) => warn!("{err:#}"),
                        Err(err) => warn!("texture writer panicked: {err}"),
                    }
                }
            }
            ViewerEvent::FovChanged(fov) => info!(fov, "field of view"),
            ViewerEvent::Playback(state) => info!(
                position = state.current_time_fraction,
                playing = state.is_playing,
                "playback"
            ),
            ViewerEvent::ScreenshotSaved(path) => info!(path = %path.display(), "screenshot saved"),
            ViewerEvent::Notification { message, error } => {
                warn!(error = %error, "{message}");
                eprintln!("{message}");
            }
            ViewerEvent::Status(s) => println!(
                "state={:?} stereo={} fov={:.1} generation={} source={} playback={}",
                s.state,
                s.stereo,
                s.fov,
                s.generation,
                s.source.as_deref().unwrap_or("-"),
                s.playback.map_or_else(
                    || "-".to_string(),
                    |p| format!("{:.3}/{}", p.current_time_fraction, if p.is_playing { "playing" } else { "paused" })
                ),
            ),
        }
    }
}
