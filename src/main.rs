//! CLI entry point for the assessment uploader.

use anyhow::{Result, bail};
use clap::Parser;
use tracing::debug;
use uploader_core::{PortalConfig, default_config_path, default_cookie_path, load_file_config};

mod cli;
mod commands;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let cookie_path = match &args.cookie_file {
        Some(path) => path.clone(),
        None => default_cookie_path()?,
    };

    if args.is_cleanup_only() {
        if args.delete_cookies {
            commands::run_delete_cookies_command(&cookie_path)?;
        }
        if args.delete_from_keyring {
            let namespace = uploader_core::user_agent::TOOL_NAME;
            commands::run_delete_from_keyring_command(args.username.as_deref(), namespace)?;
        }
        return Ok(());
    }

    let config = load_portal_config(&args)?;
    commands::run_upload_command(&args, &config, &cookie_path).await
}

fn load_portal_config(args: &Args) -> Result<PortalConfig> {
    let path = match &args.config {
        Some(path) if !path.exists() => bail!("Config file '{}' not found", path.display()),
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    debug!(path = %path.display(), "loading portal config");
    let file_config = load_file_config(&path)?;
    Ok(PortalConfig::from_file_config(&file_config)?)
}
