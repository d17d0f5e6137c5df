//! Outbound User-Agent for portal traffic.
//!
//! Tool name and crate version, so portal operators can tell uploads from
//! this tool apart from a browser.

/// Tool identity used in the User-Agent and as the keyring namespace.
pub const TOOL_NAME: &str = env!("CARGO_PKG_NAME");

/// Default User-Agent for every request made by the HTTP transport.
#[must_use]
pub fn default_user_agent() -> String {
    format!("{TOOL_NAME}/{}", env!("CARGO_PKG_VERSION"))
}
