//! Binary entrypoint for the photo carousel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use rust_photo_carousel::config::Configuration;
use rust_photo_carousel::tasks::{loader, viewer};

/// Largest texture edge every wgpu backend accepts by default.
const MAX_TEXTURE_DIM: u32 = 8192;

#[derive(Debug, Parser)]
#[command(
    name = "photo-carousel",
    version,
    about = "GPU image carousel with crossfade transitions"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Skip the first-paint reveal and show the first image immediately
    #[arg(long = "no-reveal")]
    no_reveal: bool,

    /// Enable keyboard progress scrubbing and manual advances
    #[arg(long = "debug-panel")]
    debug_panel: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("rust_photo_carousel={level}").parse()?)
        .add_directive("wgpu=warn".parse()?)
        .add_directive("winit=warn".parse()?);
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        no_reveal,
        debug_panel,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if no_reveal {
        cfg.reveal.enabled = false;
    }
    if debug_panel {
        cfg.debug_panel = true;
    }
    tracing::debug!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let images = loader::load_all(
        &cfg.images,
        cfg.loader_max_concurrent_decodes,
        MAX_TEXTURE_DIM,
    )
    .await
    .context("failed to load carousel images")?;
    info!(count = images.len(), "images_loaded");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // The event loop owns the main thread until the window closes.
    let result = viewer::run_windowed(cfg, images, cancel.clone());
    cancel.cancel();
    result
}
