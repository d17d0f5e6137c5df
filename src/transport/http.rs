//! reqwest-backed [`SessionTransport`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, ClientBuilder, RequestBuilder};
use reqwest_cookie_store::CookieStoreMutex;
use tracing::{debug, instrument};
use url::Url;

use super::cookies::{CookieFileError, CookieLoad, load_cookie_store, save_cookie_store};
use super::{PageResponse, SessionTransport, TransportError};
use crate::config::PortalConfig;
use crate::upload::{FILE_FIELD, UploadFile};

const MAX_REDIRECTS: usize = 10;

/// HTTP transport sharing one persistable cookie jar with the reqwest client.
///
/// The client follows up to ten redirects and reports the URL the chain
/// resolved to, which the login state machine classifies.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    cookies: Arc<CookieStoreMutex>,
}

impl HttpTransport {
    /// Builds a transport with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CaBundle`] when the configured trust roots
    /// cannot be loaded, or [`TransportError::Client`] when the client fails
    /// to build.
    pub fn new(config: &PortalConfig) -> Result<Self, TransportError> {
        Self::with_cookie_store(config, Arc::new(CookieStoreMutex::default()))
    }

    /// Builds a transport around an existing cookie jar.
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    #[instrument(level = "debug", skip_all)]
    pub fn with_cookie_store(
        config: &PortalConfig,
        cookies: Arc<CookieStoreMutex>,
    ) -> Result<Self, TransportError> {
        let certificates = match &config.ca_bundle {
            Some(path) => load_ca_bundle(path)?,
            None => Vec::new(),
        };
        let client = build_client(config, &cookies, &certificates)?;
        Ok(Self { client, cookies })
    }

    /// The shared cookie jar.
    #[must_use]
    pub fn cookie_store(&self) -> Arc<CookieStoreMutex> {
        Arc::clone(&self.cookies)
    }

    async fn send(
        &self,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<PageResponse, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|error| TransportError::from_reqwest(url, error))?;

        let final_url = response.url().clone();
        let status = response.status();
        debug!(requested = %url, resolved = %final_url, status = status.as_u16(), "response");
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| TransportError::from_reqwest(&final_url, error))?;
        Ok(PageResponse {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SessionTransport for HttpTransport {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn get(&self, url: &Url) -> Result<PageResponse, TransportError> {
        self.send(url, self.client.get(url.clone())).await
    }

    #[instrument(level = "debug", skip(self, fields), fields(url = %url))]
    async fn post_form(
        &self,
        url: &Url,
        fields: &[(String, String)],
    ) -> Result<PageResponse, TransportError> {
        self.send(url, self.client.post(url.clone()).form(fields))
            .await
    }

    #[instrument(level = "debug", skip(self, params), fields(url = %url))]
    async fn post_query(
        &self,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<PageResponse, TransportError> {
        self.send(url, self.client.post(url.clone()).query(params))
            .await
    }

    #[instrument(
        level = "debug",
        skip(self, fields, file),
        fields(url = %url, file = %file.file_name())
    )]
    async fn post_multipart(
        &self,
        url: &Url,
        fields: &[(String, String)],
        file: &UploadFile,
    ) -> Result<PageResponse, TransportError> {
        let handle = tokio::fs::File::open(file.path())
            .await
            .map_err(|source| TransportError::Io {
                path: file.path().to_path_buf(),
                source,
            })?;
        let part = Part::stream_with_length(reqwest::Body::from(handle), file.len())
            .file_name(file.file_name().to_string());

        let form = fields
            .iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            })
            .part(FILE_FIELD, part);

        self.send(url, self.client.post(url.clone()).multipart(form))
            .await
    }

    fn load_cookies(
        &self,
        path: &Path,
        ignore_discard: bool,
    ) -> Result<CookieLoad, CookieFileError> {
        let (store, outcome) = load_cookie_store(path, ignore_discard)?;
        let mut jar = self.cookies.lock().map_err(|_| CookieFileError::Poisoned)?;
        *jar = store;
        Ok(outcome)
    }

    fn save_cookies(&self, path: &Path, ignore_discard: bool) -> Result<usize, CookieFileError> {
        let jar = self.cookies.lock().map_err(|_| CookieFileError::Poisoned)?;
        save_cookie_store(&jar, path, ignore_discard)
    }
}

fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>, TransportError> {
    let pem = std::fs::read(path).map_err(|error| TransportError::CaBundle {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    let certificates =
        Certificate::from_pem_bundle(&pem).map_err(|error| TransportError::CaBundle {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
    if certificates.is_empty() {
        return Err(TransportError::CaBundle {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    debug!(count = certificates.len(), path = %path.display(), "loaded extra trust roots");
    Ok(certificates)
}

fn build_client(
    config: &PortalConfig,
    cookies: &Arc<CookieStoreMutex>,
    certificates: &[Certificate],
) -> Result<Client, TransportError> {
    base_client_builder(config, cookies, certificates)
        .build()
        .map_err(TransportError::Client)
}

fn base_client_builder(
    config: &PortalConfig,
    cookies: &Arc<CookieStoreMutex>,
    certificates: &[Certificate],
) -> ClientBuilder {
    certificates.iter().cloned().fold(
        Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .gzip(true)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(config.user_agent.clone())
            .cookie_provider(Arc::clone(cookies)),
        ClientBuilder::add_root_certificate,
    )
}
