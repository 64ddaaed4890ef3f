use anyhow::{Context, Result};
use clap::Parser;
use link_shortener::{DEFAULT_ENDPOINT, DEFAULT_VIEWER_BASE, LinkShortener, ShareLink};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "link-shortener",
    version,
    about = "Create a short shareable viewer link for a 360° photo or video."
)]
struct Cli {
    /// Public URL of the media to share.
    #[arg(value_name = "MEDIA_URL", default_value = "")]
    media_url: String,

    /// Viewer page the link points at.
    #[arg(long, default_value = DEFAULT_VIEWER_BASE)]
    viewer_base: String,

    /// Shortening API endpoint.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        error!(error = ?err, "link-shortener exited with error");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(true)
        .init();

    let shortener = LinkShortener::new(&cli.endpoint, &cli.viewer_base)
        .context("failed to build HTTP client")?;
    info!(endpoint = shortener.endpoint(), "shortening");
    let link = shortener
        .share(&cli.media_url)
        .await
        .context("failed to build viewer link")?;

    println!("{link}");
    if matches!(link, ShareLink::MissingInput) {
        std::process::exit(2);
    }
    Ok(())
}
