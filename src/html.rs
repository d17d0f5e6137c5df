//! HTML lookups on portal pages: the anti-forgery token and the SAML hand-off form.

use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

#[allow(clippy::expect_used)]
static LOGIN_TOKEN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[type="hidden"][name="csrf_token"]"#)
        .expect("login token selector is valid")
});
#[allow(clippy::expect_used)]
static PORTAL_TOKEN_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="csrf-token"]"#).expect("portal token selector is valid")
});
#[allow(clippy::expect_used)]
static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("form selector is valid"));
#[allow(clippy::expect_used)]
static HIDDEN_INPUT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[type="hidden"]"#).expect("hidden input selector is valid")
});

/// Which kind of page a token is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// The identity provider's login form (`input[name=csrf_token]`).
    Login,
    /// Any teaching portal page (`meta[name=csrf-token]`).
    Portal,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("login page csrf_token input"),
            Self::Portal => f.write_str("portal csrf-token meta tag"),
        }
    }
}

/// Anti-forgery token scraped from a single page.
///
/// Valid only for requests following that page; the value rotates once the
/// session becomes authenticated. Redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// The raw token value to send back to the server.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// A form whose hidden fields are re-posted to its action (SAML hand-off).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenForm {
    /// Absolute URL the form submits to.
    pub action: Url,
    /// Hidden input `(name, value)` pairs in document order.
    pub fields: Vec<(String, String)>,
}

/// Errors from HTML lookups.
#[derive(Debug, thiserror::Error)]
pub enum HtmlError {
    /// The expected token element or attribute is absent.
    #[error("anti-forgery token not found ({kind})")]
    TokenNotFound {
        /// Which lookup was attempted.
        kind: PageKind,
    },
    /// The page has no form to re-post.
    #[error("no form found on page")]
    FormNotFound,
    /// The form has no action attribute.
    #[error("form has no action attribute")]
    FormActionMissing,
    /// The form action cannot be resolved to a URL.
    #[error("form action '{0}' is not a valid URL")]
    InvalidFormAction(String),
}

/// Extracts the anti-forgery token from a fetched page.
///
/// # Errors
///
/// Returns [`HtmlError::TokenNotFound`] when the element for `kind` is missing
/// or has no value.
#[instrument(level = "debug", skip(page_content))]
pub fn extract_token(page_content: &str, kind: PageKind) -> Result<AuthToken, HtmlError> {
    let document = Html::parse_document(page_content);
    let (selector, attribute) = match kind {
        PageKind::Login => (&*LOGIN_TOKEN_SELECTOR, "value"),
        PageKind::Portal => (&*PORTAL_TOKEN_SELECTOR, "content"),
    };

    let token = document
        .select(selector)
        .find_map(|element| element.value().attr(attribute))
        .map(|value| AuthToken(value.to_string()))
        .ok_or(HtmlError::TokenNotFound { kind })?;
    debug!("found anti-forgery token");
    Ok(token)
}

/// Parses the page's first form into its resolved action and hidden fields.
///
/// Relative actions are resolved against `base_url` (the page's own URL).
/// A hidden input without a `value` attribute contributes an empty string;
/// inputs without a `name` are skipped.
///
/// # Errors
///
/// Returns [`HtmlError::FormNotFound`], [`HtmlError::FormActionMissing`] or
/// [`HtmlError::InvalidFormAction`].
#[instrument(level = "debug", skip(page_content), fields(base = %base_url))]
pub fn extract_auto_submit_form(
    page_content: &str,
    base_url: &Url,
) -> Result<HiddenForm, HtmlError> {
    let document = Html::parse_document(page_content);
    let form = document
        .select(&FORM_SELECTOR)
        .next()
        .ok_or(HtmlError::FormNotFound)?;

    let raw_action = form
        .value()
        .attr("action")
        .ok_or(HtmlError::FormActionMissing)?;
    let action = base_url
        .join(raw_action.trim())
        .map_err(|_| HtmlError::InvalidFormAction(raw_action.to_string()))?;

    let fields = hidden_fields(form);
    debug!(action = %action, fields = fields.len(), "parsed auto-submit form");
    Ok(HiddenForm { action, fields })
}

fn hidden_fields(form: ElementRef<'_>) -> Vec<(String, String)> {
    form.select(&HIDDEN_INPUT_SELECTOR)
        .filter_map(|input| {
            let element = input.value();
            let name = element.attr("name")?;
            let value = element.attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
