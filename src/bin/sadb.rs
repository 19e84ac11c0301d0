// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use sadb::{
    catalog::{feed::refresh_catalog, Catalog},
    config::Settings,
    download::{feed_url, Downloader, APP_FEED, SOURCE_FEED},
    installed::refresh_installed,
    privilege::require_root,
    reconcile::{check_sources, generate_sources, load_sources, CheckReport},
    source::SourceRegistry,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "sadb [options] <sadb-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Show progress and debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Run selected command, returning whether it succeeded.
    async fn run(self) -> Result<bool> {
        // INVARIANT: Privilege is checked before any I/O.
        if matches!(self.command, Command::Update | Command::UpdateSource) {
            require_root()?;
        }

        let mut settings = match &self.config {
            Some(path) => Settings::load_from_path(path)?,
            None => Settings::load()?,
        };
        settings.verbose = self.verbose;

        match self.command {
            Command::Update => run_update(&settings).await,
            Command::UpdateSource => run_update_source(&settings).await,
            Command::UpdateDb => run_update_db(&settings).await,
            Command::CheckSources => run_check_sources(&settings).await,
            Command::GetDbLocation => run_get_db_location(&settings),
            Command::UpdateInstalled => run_update_installed(&settings).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Reconcile sources, then refresh catalog and installed apps.
    #[command(name = "update", override_usage = "sudo sadb update [options]")]
    Update,

    /// Reconcile package sources with the source feed.
    #[command(name = "update_source", override_usage = "sudo sadb update_source [options]")]
    UpdateSource,

    /// Refresh catalog from the app feed.
    #[command(name = "update_db", override_usage = "sadb update_db [options]")]
    UpdateDb,

    /// Check package sources against the source feed without changing them.
    #[command(name = "check_sources", override_usage = "sadb check_sources [options]")]
    CheckSources,

    /// Print location of catalog database.
    #[command(name = "get_db_location", override_usage = "sadb get_db_location [options]")]
    GetDbLocation,

    /// Refresh listing of installed apps.
    #[command(name = "update_installed", override_usage = "sadb update_installed [options]")]
    UpdateInstalled,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match cli.run().await {
        Ok(true) => exit(0),
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

async fn fetch_feed(settings: &Settings, feed: &str) -> Result<String> {
    let url = feed_url(&settings.repo_url, feed)?;
    let downloader = Downloader::new(settings.timeout)?;
    Ok(downloader.fetch(url, settings.verbose).await?)
}

async fn run_update(settings: &Settings) -> Result<bool> {
    info!("reconcile sources (1/3)");
    let source_feed = fetch_feed(settings, SOURCE_FEED).await?;
    generate_sources(&source_feed, &SourceRegistry::default(), settings)?;

    // INVARIANT: Catalog is only touched after the app feed arrived in full.
    info!("refresh catalog (2/3)");
    let app_feed = fetch_feed(settings, APP_FEED).await?;
    let mut catalog = Catalog::open(&settings.db_location)?;
    refresh_catalog(&mut catalog, &app_feed)?;

    info!("refresh installed apps (3/3)");
    let sources = load_sources(&source_feed, &SourceRegistry::default(), settings)?;
    if let Err(err) = refresh_installed(&mut catalog, &sources) {
        warn!("failed to refresh installed apps: {err}");
    }

    Ok(true)
}

async fn run_update_source(settings: &Settings) -> Result<bool> {
    let source_feed = fetch_feed(settings, SOURCE_FEED).await?;
    let report = generate_sources(&source_feed, &SourceRegistry::default(), settings)?;
    for name in &report.written {
        info!("wrote configuration for {name}");
    }

    Ok(true)
}

async fn run_update_db(settings: &Settings) -> Result<bool> {
    let app_feed = fetch_feed(settings, APP_FEED).await?;
    let mut catalog = Catalog::open(&settings.db_location)?;
    refresh_catalog(&mut catalog, &app_feed)?;

    Ok(true)
}

async fn run_check_sources(settings: &Settings) -> Result<bool> {
    let source_feed = fetch_feed(settings, SOURCE_FEED).await?;
    match check_sources(&source_feed, &SourceRegistry::default(), settings)? {
        CheckReport::Passed => {
            info!("all sources match");
            Ok(true)
        }
        CheckReport::Failed { reason, .. } => {
            error!("{reason}");
            println!("Source check failed. Please run 'sadb update_source' with root to fix sources.");
            Ok(false)
        }
    }
}

fn run_get_db_location(settings: &Settings) -> Result<bool> {
    println!("{}", settings.db_location.display());
    Ok(true)
}

async fn run_update_installed(settings: &Settings) -> Result<bool> {
    let source_feed = fetch_feed(settings, SOURCE_FEED).await?;
    let sources = load_sources(&source_feed, &SourceRegistry::default(), settings)?;
    let mut catalog = Catalog::open(&settings.db_location)?;
    refresh_installed(&mut catalog, &sources)?;

    Ok(true)
}
