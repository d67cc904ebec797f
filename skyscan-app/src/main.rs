use anyhow::{Context, Result};
use clap::Parser;
use skyscan_common::observability::{LogConfig, LogFormat, init_logging};
use skyscan_config::{SkyscanConfig, SkyscanConfigLoader, default_config_path};
use skyscan_digest::{Envelope, SearchHandler, SearchParams};
use std::path::PathBuf;
use std::process::ExitCode;

/// Find high-engagement Bluesky posts and print a ready-to-paste digest.
#[derive(Parser)]
#[command(name = "skyscan", version)]
struct Cli {
    /// Search text.
    #[arg(short, long)]
    q: Option<String>,
    /// Recency window in hours [default: 6].
    #[arg(long)]
    hours: Option<String>,
    /// Minimum repost count [default: 10].
    #[arg(long)]
    min_reposts: Option<String>,
    /// Minimum like count [default: 0].
    #[arg(long)]
    min_likes: Option<String>,
    /// Maximum raw posts to scan [default: 50].
    #[arg(long)]
    limit: Option<String>,
    /// YAML config file. Defaults to the user config dir, then ./skyscan.yaml.
    #[arg(long, env = "SKYSCAN_CONFIG")]
    config: Option<PathBuf>,
    /// Print only the HTML fragment instead of the JSON envelope.
    #[arg(long)]
    html: bool,
    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<SkyscanConfig> {
    let loader = match path {
        Some(p) => SkyscanConfigLoader::new().with_file(p),
        None => {
            let mut loader = SkyscanConfigLoader::new();
            if let Some(user) = default_config_path() {
                loader = loader.with_optional_file(user);
            }
            loader.with_optional_file("skyscan.yaml")
        }
    };
    loader.load().context("loading skyscan config")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_path = init_logging(LogConfig {
        emit_stderr: true,
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        ..LogConfig::default()
    })?;
    tracing::debug!(log_file = %log_path.display(), "logging initialised");

    let cfg = load_config(cli.config.as_ref())?;
    tracing::debug!(?cfg, "config loaded");
    let handler = SearchHandler::from_config(&cfg)?;

    let params = SearchParams {
        q: cli.q,
        hours: cli.hours,
        min_reposts: cli.min_reposts,
        min_likes: cli.min_likes,
        limit: cli.limit,
    };
    let resp = handler.handle(&params).await;

    match (&resp.body, cli.html) {
        (Envelope::Success(digest), true) => println!("{}", digest.prep_html),
        (body, _) => println!("{}", serde_json::to_string_pretty(body)?),
    }

    Ok(if resp.status.is_success() {
        ExitCode::SUCCESS
    } else if resp.status.is_client_error() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    })
}
