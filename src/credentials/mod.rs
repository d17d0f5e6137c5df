//! Credential resolution: explicit value, then secret store, then prompt.
//!
//! The username doubles as the store account and is never stored itself.
//! Password and exam number are stored under `<tool>:<kind>` services when the
//! store is enabled, and newly prompted values are written back.

mod prompt;
mod store;

use std::fmt;

use tracing::{debug, info, warn};

pub use prompt::{Prompter, TerminalPrompter};
pub use store::{KeyringStore, SecretStore};

/// Errors raised while resolving or deleting credentials.
///
/// A store miss is not an error: it falls through to the prompt.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The secret store backend could not be reached at all.
    #[error("secret store is unavailable")]
    StoreUnavailable,
    /// The secret store reported a failure.
    #[error("secret store {operation} failed: {reason}")]
    Store {
        /// `open`, `read`, `write` or `delete`.
        operation: &'static str,
        /// Backend error text.
        reason: String,
    },
    /// Reading from the terminal failed.
    #[error("failed to read credential from terminal: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// The three values the login flow may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Login name, e.g. `ab1234`.
    Username,
    /// SSO password.
    Password,
    /// Exam number for the secondary confirmation, e.g. `Y1234567`.
    ExamNumber,
}

impl CredentialKind {
    /// Kinds kept in the secret store.
    pub const STORED: [Self; 2] = [Self::Password, Self::ExamNumber];

    fn is_stored(self) -> bool {
        !matches!(self, Self::Username)
    }

    fn is_secret(self) -> bool {
        !matches!(self, Self::Username)
    }

    fn slug(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::ExamNumber => "exam-number",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Password => "Password",
            Self::ExamNumber => "Exam number",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Outcome of deleting stored credentials for one user.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    /// Entries that existed and were removed.
    pub removed: Vec<CredentialKind>,
    /// Entries that were not present.
    pub missing: Vec<CredentialKind>,
}

/// Resolves credential values against a secret store and a prompter.
pub struct CredentialProvider<'a> {
    store: &'a dyn SecretStore,
    prompter: &'a dyn Prompter,
    namespace: String,
}

impl<'a> CredentialProvider<'a> {
    /// Creates a provider; `namespace` prefixes every store service name.
    #[must_use]
    pub fn new(
        store: &'a dyn SecretStore,
        prompter: &'a dyn Prompter,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prompter,
            namespace: namespace.into(),
        }
    }

    fn service(&self, kind: CredentialKind) -> String {
        format!("{}:{}", self.namespace, kind.slug())
    }

    /// Resolves one value.
    ///
    /// An explicit value wins without touching the store. Otherwise, when
    /// `use_store` is set, the store is consulted under `identity`; on a miss
    /// the user is prompted and the answer is written back to the store.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Prompt`] if prompting fails. Store failures
    /// are logged and treated as a miss.
    pub fn resolve(
        &self,
        kind: CredentialKind,
        explicit: Option<&str>,
        identity: &str,
        use_store: bool,
    ) -> Result<String, CredentialError> {
        if let Some(value) = explicit {
            debug!(%kind, "using explicitly supplied value");
            return Ok(value.to_string());
        }

        let use_store = use_store && kind.is_stored();
        if use_store {
            match self.store.get(&self.service(kind), identity) {
                Ok(Some(value)) => {
                    debug!(%kind, "loaded from secret store");
                    return Ok(value);
                }
                Ok(None) => debug!(%kind, "not in secret store"),
                Err(error) => warn!(%kind, %error, "secret store lookup failed; prompting instead"),
            }
        }

        let value = if kind.is_secret() {
            self.prompter.prompt_secret(kind.label())?
        } else {
            self.prompter.prompt_plain(kind.label())?
        };

        if use_store {
            match self.store.set(&self.service(kind), identity, &value) {
                Ok(()) => info!(%kind, "saved to secret store"),
                Err(error) => warn!(%kind, %error, "could not save to secret store"),
            }
        }
        Ok(value)
    }

    /// Removes the stored password and exam number for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the store fails for a reason other than
    /// the entry being absent.
    pub fn delete(&self, identity: &str) -> Result<DeleteReport, CredentialError> {
        let mut report = DeleteReport::default();
        for kind in CredentialKind::STORED {
            if self.store.delete(&self.service(kind), identity)? {
                info!(%kind, "deleted from secret store");
                report.removed.push(kind);
            } else {
                info!(%kind, "not present in secret store");
                report.missing.push(kind);
            }
        }
        Ok(report)
    }
}

/// Username, password and exam number, each resolved at most once.
#[derive(Clone, Default)]
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
    exam_number: Option<String>,
    use_store: bool,
}

impl Credentials {
    /// Starts from whatever values were supplied up front.
    #[must_use]
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        exam_number: Option<String>,
        use_store: bool,
    ) -> Self {
        Self {
            username,
            password,
            exam_number,
            use_store,
        }
    }

    /// The username, prompting on first use if it was not supplied.
    ///
    /// # Errors
    ///
    /// See [`CredentialProvider::resolve`].
    pub fn username(
        &mut self,
        provider: &CredentialProvider<'_>,
    ) -> Result<String, CredentialError> {
        let value = provider.resolve(
            CredentialKind::Username,
            self.username.as_deref(),
            "",
            false,
        )?;
        self.username = Some(value.clone());
        Ok(value)
    }

    /// The password for the resolved username.
    ///
    /// # Errors
    ///
    /// See [`CredentialProvider::resolve`].
    pub fn password(
        &mut self,
        provider: &CredentialProvider<'_>,
    ) -> Result<String, CredentialError> {
        let username = self.username(provider)?;
        let value = provider.resolve(
            CredentialKind::Password,
            self.password.as_deref(),
            &username,
            self.use_store,
        )?;
        self.password = Some(value.clone());
        Ok(value)
    }

    /// The exam number for the resolved username.
    ///
    /// # Errors
    ///
    /// See [`CredentialProvider::resolve`].
    pub fn exam_number(
        &mut self,
        provider: &CredentialProvider<'_>,
    ) -> Result<String, CredentialError> {
        let username = self.username(provider)?;
        let value = provider.resolve(
            CredentialKind::ExamNumber,
            self.exam_number.as_deref(),
            &username,
            self.use_store,
        )?;
        self.exam_number = Some(value.clone());
        Ok(value)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("exam_number", &redact(&self.exam_number))
            .field("use_store", &self.use_store)
            .finish()
    }
}
