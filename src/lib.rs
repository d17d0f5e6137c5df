//! Assessment uploader core library.
//!
//! Logs in to the York Computer Science teaching portal through the
//! university's SAML single sign-on, confirms the exam number, and uploads one
//! file over the authenticated session.
//!
//! # Architecture
//!
//! - [`html`] - anti-forgery token and SAML hand-off form extraction
//! - [`credentials`] - username, password and exam number resolution
//! - [`transport`] - cookie-carrying HTTP session and cookie persistence
//! - [`login`] - the login state machine and the upload run
//! - [`upload`] - the final multipart upload
//! - [`config`] - portal endpoints and transport settings

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod credentials;
pub mod digest;
pub mod html;
pub mod login;
pub mod transport;
pub mod upload;
pub mod user_agent;

// Re-export commonly used types
pub use config::{
    ConfigError, Endpoint, FileConfig, PortalConfig, default_config_path, default_cookie_path,
    load_file_config, resolve_submit_url,
};
pub use credentials::{
    CredentialError, CredentialKind, CredentialProvider, Credentials, DeleteReport, KeyringStore,
    Prompter, SecretStore, TerminalPrompter,
};
pub use digest::md5_file;
pub use html::{AuthToken, HiddenForm, HtmlError, PageKind, extract_auto_submit_form, extract_token};
pub use login::{LoginError, LoginMachine, ProtocolState, ReadyPage, RunReport, run_session};
pub use transport::{
    CookieFileError, CookieLoad, HttpTransport, PageResponse, SessionTransport, TransportError,
    delete_cookie_file, load_cookie_store, save_cookie_store,
};
pub use upload::{UploadError, UploadFile, upload_file};
