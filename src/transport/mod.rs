//! Session transport: cookie-carrying requests against the portal.
//!
//! The login state machine is written against [`SessionTransport`] only. The
//! reqwest-backed [`HttpTransport`] is the implementation used by the CLI;
//! a browser-driven transport would implement the same trait.

mod cookies;
mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use url::Url;

use crate::upload::UploadFile;

pub use cookies::{
    CookieFileError, CookieLoad, delete_cookie_file, load_cookie_store, save_cookie_store,
};
pub use http::HttpTransport;

/// The final response of a request, after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// URL the redirect chain resolved to; state detection depends on it.
    pub url: Url,
    /// HTTP status of the final response (always a success status).
    pub status: u16,
    /// Decoded text body.
    pub body: String,
}

/// Errors from transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network-level failure (DNS, connection refused, TLS, redirect loop).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The request did not complete within the configured timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },
    /// The final response had a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// URL of the failing response.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The file to upload could not be opened.
    #[error("cannot open {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The trust-root bundle could not be read or parsed.
    #[error("invalid CA bundle {path}: {reason}")]
    CaBundle {
        /// Bundle path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TransportError {
    pub(crate) fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Cookie-carrying request capability used by the login state machine.
///
/// Redirects are followed by the implementation; every method returns the
/// final [`PageResponse`] or fails on a non-success status.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// GET `url`.
    async fn get(&self, url: &Url) -> Result<PageResponse, TransportError>;

    /// POST `fields` as an urlencoded form body.
    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PageResponse, TransportError>;

    /// POST with `params` in the query string and an empty body.
    async fn post_query(
        &self,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<PageResponse, TransportError>;

    /// POST a multipart body: `fields` as text parts, then `file` as the `file` part.
    async fn post_multipart(
        &self,
        url: &Url,
        fields: &[(String, String)],
        file: &UploadFile,
    ) -> Result<PageResponse, TransportError>;

    /// Replaces the session cookies with those stored at `path`.
    ///
    /// # Errors
    ///
    /// A missing file is not an error ([`CookieLoad::Missing`]).
    fn load_cookies(
        &self,
        path: &Path,
        ignore_discard: bool,
    ) -> Result<CookieLoad, CookieFileError>;

    /// Writes the session cookies to `path`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`CookieFileError`] when the file cannot be written.
    fn save_cookies(&self, path: &Path, ignore_discard: bool) -> Result<usize, CookieFileError>;
}
