mod feed;
mod redmine;
mod render;
mod sync;

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ical2redmine_core::SyncResult;
use ical2redmine_core::config::SyncConfig;
use log::LevelFilter;
use owo_colors::OwoColorize;

use crate::feed::FeedFetcher;
use crate::redmine::RedmineClient;
use crate::render::{PlanRender, Render};
use crate::sync::SyncRun;

#[derive(Parser)]
#[command(name = "ical2redmine")]
#[command(about = "Mirror iCal calendar events as Redmine time entries")]
#[command(version)]
struct Cli {
    /// The settings to use for creating time entries (.json or .toml)
    #[arg(short, long)]
    settings: PathBuf,

    /// Log level (error, warning, info, debug, trace)
    #[arg(short, long, default_value = "warning")]
    log: String,

    /// Show what would change without writing to Redmine
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, list every event including skipped ones
    #[arg(short, long)]
    verbose: bool,
}

fn parse_level(value: &str) -> Result<LevelFilter> {
    if value.eq_ignore_ascii_case("warning") {
        return Ok(LevelFilter::Warn);
    }
    LevelFilter::from_str(value).map_err(|_| anyhow::anyhow!("Invalid log level: {value}"))
}

fn init_logging(level: LevelFilter) {
    // Dependencies only get to speak up about warnings and errors
    env_logger::Builder::new()
        .filter_level(level.min(LevelFilter::Warn))
        .filter_module("ical2redmine", level)
        .filter_module("ical2redmine_core", level)
        .format(|buf, record| writeln!(buf, "{}\t{}", record.level(), record.args()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(parse_level(&cli.log)?);

    log::info!("Loading settings from: {}", cli.settings.display());
    let config = SyncConfig::load(&cli.settings).context("Couldn't load settings file")?;
    log::debug!("Redmine URL: {}", config.redmine_url);

    let clients = config
        .api_keys()
        .into_iter()
        .map(|key| {
            RedmineClient::new(
                config.redmine_url.as_str(),
                key,
                config.custom_time_entry_field_id,
            )
        })
        .collect::<SyncResult<Vec<_>>>()?;

    let run = SyncRun::new(&config, clients, FeedFetcher::new()?, Utc::now(), cli.dry_run);
    let report = run.run().await?;

    if cli.dry_run {
        println!("{}", report.plan.render(cli.verbose));
        return Ok(());
    }

    for failure in &report.stats.failures {
        eprintln!("   {} {}: {}", "!".red(), failure.action, failure.error);
    }
    println!("{}", report.stats.render());

    Ok(())
}
