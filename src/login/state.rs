//! Protocol state detection from the resolved redirect target.

use std::fmt;

use url::Url;

use crate::config::{Endpoint, PortalConfig};

/// The outstanding authentication step, derived from where a request ended up.
///
/// Recomputed from every resolved URL and never stored between steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolState {
    /// Landed on the login page with the fresh-login query.
    NeedsFullLogin,
    /// Landed on the login page with any other query: the first half of the
    /// SAML exchange already happened in an earlier run.
    NeedsSecondaryCodeResume,
    /// Landed on the exam number confirmation page.
    NeedsSecondaryCode,
    /// Landed on the target itself.
    Ready,
    /// Landed anywhere else.
    Unexpected(Url),
}

impl ProtocolState {
    /// Classifies `resolved` against the login, exam number and target endpoints.
    ///
    /// Login is checked first: an exact match (including the fresh-login
    /// query) is a full login, a host+path match with another query resumes.
    #[must_use]
    pub fn classify(resolved: &Url, config: &PortalConfig, target: &Url) -> Self {
        if config.login.matches_exactly(resolved) {
            Self::NeedsFullLogin
        } else if config.login.matches_location(resolved) {
            Self::NeedsSecondaryCodeResume
        } else if config.exam_number.matches_exactly(resolved) {
            Self::NeedsSecondaryCode
        } else if Endpoint::new(target.clone()).matches_exactly(resolved) {
            Self::Ready
        } else {
            Self::Unexpected(resolved.clone())
        }
    }

    /// Whether this state leads to an exam number submission.
    #[must_use]
    pub fn needs_exam_number(&self) -> bool {
        matches!(
            self,
            Self::NeedsFullLogin | Self::NeedsSecondaryCodeResume | Self::NeedsSecondaryCode
        )
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsFullLogin => f.write_str("needs full login"),
            Self::NeedsSecondaryCodeResume => f.write_str("needs login resume"),
            Self::NeedsSecondaryCode => f.write_str("needs exam number"),
            Self::Ready => f.write_str("ready"),
            Self::Unexpected(url) => write!(f, "unexpected location {url}"),
        }
    }
}
