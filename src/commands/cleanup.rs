//! Cleanup command handlers: delete the cookie file and stored credentials.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::info;
use uploader_core::{
    CredentialProvider, Credentials, KeyringStore, TerminalPrompter, delete_cookie_file,
};

pub fn run_delete_cookies_command(cookie_path: &Path) -> Result<()> {
    info!("Deleting cookie file '{}'", cookie_path.display());
    if delete_cookie_file(cookie_path)? {
        info!("Deleted cookie file");
    } else {
        info!("Cookie file doesn't exist");
    }
    Ok(())
}

pub fn run_delete_from_keyring_command(username: Option<&str>, namespace: &str) -> Result<()> {
    info!("Deleting password and exam number from keyring");
    let store = KeyringStore;
    let prompter = TerminalPrompter;
    let provider = CredentialProvider::new(&store, &prompter, namespace);

    let mut credentials = Credentials::new(username.map(str::to_string), None, None, false);
    let username = credentials.username(&provider)?;
    let report = provider
        .delete(&username)
        .map_err(|error| anyhow!("Failed to delete stored credentials: {error}"))?;

    info!(
        removed = report.removed.len(),
        missing = report.missing.len(),
        "Keyring cleanup complete"
    );
    Ok(())
}
