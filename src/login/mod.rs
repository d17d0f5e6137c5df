//! Login state machine: from an unauthenticated request to an upload token.
//!
//! Each run starts by requesting the target. Where the redirect chain ends
//! decides the outstanding step ([`ProtocolState`]): a full SAML login, the
//! second half of a SAML login left over from an earlier run, only the exam
//! number, or nothing at all. The machine only moves forward and never
//! retries; any failed request aborts the run.

mod state;

use tracing::{debug, info, instrument};
use url::Url;

use crate::config::PortalConfig;
use crate::credentials::{CredentialError, CredentialProvider, Credentials};
use crate::html::{AuthToken, HtmlError, PageKind, extract_auto_submit_form, extract_token};
use crate::transport::{PageResponse, SessionTransport, TransportError};
use crate::upload::{UploadError, UploadFile, upload_file};

pub use state::ProtocolState;

/// Login form field names posted to the identity provider.
const FIELD_LOGIN_TOKEN: &str = "csrf_token";
const FIELD_USERNAME: &str = "j_username";
const FIELD_PASSWORD: &str = "j_password";
const FIELD_PROCEED: &str = "_eventId_proceed";
/// Exam number confirmation parameters.
const FIELD_PORTAL_TOKEN: &str = "_token";
const FIELD_EXAM_NUMBER: &str = "examNumber";

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// A token or form was missing from a page.
    #[error(transparent)]
    Html(#[from] HtmlError),
    /// A request failed or returned a non-success status.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A credential could not be resolved.
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// The target resolved somewhere the login flow does not know.
    #[error("unexpected redirect to '{0}'; the portal login flow may have changed")]
    UnexpectedRedirect(Url),
    /// The final upload failed.
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// An authenticated session positioned to upload to the target.
#[derive(Debug, Clone)]
pub struct ReadyPage {
    /// State detected from the first request, before any login step.
    pub initial_state: ProtocolState,
    /// Portal token to send with the upload.
    pub token: AuthToken,
}

/// Outcome of [`run_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// State detected from the first request.
    pub initial_state: ProtocolState,
    /// Whether the upload POST was sent (false under dry run).
    pub uploaded: bool,
}

/// Drives the login flow for one run over a [`SessionTransport`].
pub struct LoginMachine<'a, 'p> {
    transport: &'a dyn SessionTransport,
    config: &'a PortalConfig,
    provider: &'a CredentialProvider<'p>,
    credentials: Credentials,
}

impl<'a, 'p> LoginMachine<'a, 'p> {
    /// Creates a machine; credentials are resolved only when a step needs them.
    #[must_use]
    pub fn new(
        transport: &'a dyn SessionTransport,
        config: &'a PortalConfig,
        provider: &'a CredentialProvider<'p>,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            config,
            provider,
            credentials,
        }
    }

    /// Authenticates until the session can upload to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::UnexpectedRedirect`] when the first request lands
    /// on an unknown page (no further requests are made), and the respective
    /// variant for any failed request, missing token or credential failure.
    #[instrument(skip(self, target), fields(url = %target))]
    pub async fn authenticate(&mut self, target: &Url) -> Result<ReadyPage, LoginError> {
        let page = self.transport.get(target).await?;
        let state = ProtocolState::classify(&page.url, self.config, target);
        debug!(resolved = %page.url, %state, "classified session");

        let token = match &state {
            ProtocolState::NeedsFullLogin => {
                info!("Logging in");
                let page = self.full_login(&page).await?;
                info!("Logged in");
                self.confirm_after_login(&page).await?
            }
            ProtocolState::NeedsSecondaryCodeResume => {
                info!("Resuming partial login");
                let page = self.resume_login(&page).await?;
                info!("Logged in");
                self.confirm_after_login(&page).await?
            }
            ProtocolState::NeedsSecondaryCode => {
                let exam_number = self.credentials.exam_number(self.provider)?;
                let token = extract_token(&page.body, PageKind::Portal)?;
                self.submit_exam_number(&token, &exam_number).await?;
                token
            }
            ProtocolState::Ready => {
                info!("Session already authenticated");
                extract_token(&page.body, PageKind::Portal)?
            }
            ProtocolState::Unexpected(url) => {
                return Err(LoginError::UnexpectedRedirect(url.clone()));
            }
        };

        Ok(ReadyPage {
            initial_state: state,
            token,
        })
    }

    /// Both halves of the SAML exchange. All three credentials are resolved
    /// before the first POST so the user is not prompted mid-flow.
    async fn full_login(&mut self, login_page: &PageResponse) -> Result<PageResponse, LoginError> {
        let username = self.credentials.username(self.provider)?;
        let password = self.credentials.password(self.provider)?;
        self.credentials.exam_number(self.provider)?;

        let token = extract_token(&login_page.body, PageKind::Login)?;
        let fields = vec![
            (FIELD_LOGIN_TOKEN.to_string(), token.as_str().to_string()),
            (FIELD_USERNAME.to_string(), username),
            (FIELD_PASSWORD.to_string(), password),
            (FIELD_PROCEED.to_string(), String::new()),
        ];
        let saml_page = self
            .transport
            .post_form(self.config.login.url(), &fields)
            .await?;
        self.post_saml_form(&saml_page).await
    }

    /// Only the second half of the SAML exchange; the current page already
    /// carries the hand-off form.
    async fn resume_login(&mut self, saml_page: &PageResponse) -> Result<PageResponse, LoginError> {
        self.credentials.username(self.provider)?;
        self.credentials.exam_number(self.provider)?;
        self.post_saml_form(saml_page).await
    }

    async fn post_saml_form(&self, page: &PageResponse) -> Result<PageResponse, LoginError> {
        let form = extract_auto_submit_form(&page.body, &page.url)?;
        debug!(action = %form.action, "posting SAML hand-off form");
        Ok(self.transport.post_form(&form.action, &form.fields).await?)
    }

    /// The token rotates once the session is authenticated, so it is read
    /// again from the post-login page and reused for the upload.
    async fn confirm_after_login(&mut self, page: &PageResponse) -> Result<AuthToken, LoginError> {
        let token = extract_token(&page.body, PageKind::Portal)?;
        let exam_number = self.credentials.exam_number(self.provider)?;
        self.submit_exam_number(&token, &exam_number).await?;
        Ok(token)
    }

    async fn submit_exam_number(
        &self,
        token: &AuthToken,
        exam_number: &str,
    ) -> Result<PageResponse, LoginError> {
        info!("Entering exam number");
        let params = [
            (FIELD_PORTAL_TOKEN.to_string(), token.as_str().to_string()),
            (FIELD_EXAM_NUMBER.to_string(), exam_number.to_string()),
        ];
        let response = self
            .transport
            .post_query(self.config.exam_number.url(), &params)
            .await?;
        info!("Entered exam number");
        Ok(response)
    }
}

/// Authenticates, then uploads `file` to `target` once.
///
/// Under `dry_run` every authentication step still runs and only the upload
/// POST is skipped.
///
/// # Errors
///
/// See [`LoginMachine::authenticate`]; upload failures are
/// [`LoginError::Upload`].
pub async fn run_session(
    machine: &mut LoginMachine<'_, '_>,
    target: &Url,
    file: &UploadFile,
    dry_run: bool,
) -> Result<RunReport, LoginError> {
    let ready = machine.authenticate(target).await?;
    if dry_run {
        info!("Dry run: skipped actual upload");
        return Ok(RunReport {
            initial_state: ready.initial_state,
            uploaded: false,
        });
    }

    upload_file(machine.transport, &ready.token, target, file).await?;
    Ok(RunReport {
        initial_state: ready.initial_state,
        uploaded: true,
    })
}
