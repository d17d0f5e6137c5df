//! The upload run: locate file, load cookies, authenticate, upload, save cookies.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};
use uploader_core::{
    CookieLoad, CredentialProvider, Credentials, HttpTransport, KeyringStore, LoginMachine,
    PortalConfig, SessionTransport, TerminalPrompter, UploadFile, md5_file, run_session,
};

use crate::cli::Args;

/// Session-only cookies carry the half-finished SAML login, so they are
/// always kept in the jar file.
const KEEP_SESSION_COOKIES: bool = true;

pub async fn run_upload_command(
    args: &Args,
    config: &PortalConfig,
    cookie_path: &Path,
) -> Result<()> {
    let submit_url = args
        .submit_url
        .as_deref()
        .context("--submit-url is required")?;
    let target = config.resolve_submit_url(submit_url)?;
    info!("Submitting to '{target}'");

    let file = UploadFile::open(&args.file)?;
    info!("Found file '{}'", file.path().display());
    let digest = md5_file(file.path())
        .await
        .with_context(|| format!("Cannot hash '{}'", file.path().display()))?;
    info!("MD5 hash of file: {digest}");

    let transport = HttpTransport::new(config)?;
    if args.save_cookies {
        info!("Loading cookie file '{}'", cookie_path.display());
        match transport.load_cookies(cookie_path, KEEP_SESSION_COOKIES)? {
            CookieLoad::Loaded(count) => info!(count, "Loaded cookies"),
            CookieLoad::Missing => info!("No cookies to load"),
        }
    }

    let store = KeyringStore;
    let prompter = TerminalPrompter;
    let provider = CredentialProvider::new(&store, &prompter, config.tool_name.as_str());
    let credentials = Credentials::new(
        args.username.clone(),
        args.password.clone(),
        args.exam_number.clone(),
        args.use_keyring,
    );
    let mut machine = LoginMachine::new(&transport, config, &provider, credentials);

    let report = run_session(&mut machine, &target, &file, args.dry_run).await?;
    debug!(initial_state = %report.initial_state, uploaded = report.uploaded, "run complete");
    if report.uploaded {
        info!("Uploaded fine");
    }

    if args.save_cookies {
        let saved = transport.save_cookies(cookie_path, KEEP_SESSION_COOKIES)?;
        info!(count = saved, "Saved cookies");
    }

    info!("Finished!");
    Ok(())
}
