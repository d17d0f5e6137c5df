//! CLI command handlers.

mod cleanup;
mod upload;

pub use cleanup::{run_delete_cookies_command, run_delete_from_keyring_command};
pub use upload::run_upload_command;
