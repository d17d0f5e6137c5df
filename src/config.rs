//! Portal configuration: endpoints, submit base, transport settings.
//!
//! A single immutable [`PortalConfig`] is built at start-up (built-in York
//! defaults, optionally overridden by a `key = "value"` config file) and passed
//! by reference to everything that talks to the portal.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::user_agent;

/// Shibboleth login page, including the query that marks a fresh login.
pub const DEFAULT_LOGIN_URL: &str =
    "https://shib.york.ac.uk/idp/profile/SAML2/Redirect/SSO?execution=e1s1";
/// Secondary confirmation page asking for the exam number.
pub const DEFAULT_EXAM_NUMBER_URL: &str =
    "https://teaching.cs.york.ac.uk/student/confirm-exam-number";
/// Canonical prefix of every submit URL.
pub const DEFAULT_SUBMIT_BASE: &str = "https://teaching.cs.york.ac.uk/student";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;
const CONFIG_DIR_NAME: &str = "assessment-uploader";
const CONFIG_FILE_NAME: &str = "config.toml";
const COOKIE_FILE_NAME: &str = "cookies.json";

/// Errors building the portal configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Reading the config file failed.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A config line could not be parsed.
    #[error("invalid config syntax on line {line}: {reason}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// A config value is a malformed URL.
    #[error("invalid URL for `{field}`: '{value}'")]
    InvalidUrl {
        /// Config key or argument name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A timeout is outside the accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: 1..=3600")]
    InvalidTimeout {
        /// Config key.
        field: &'static str,
        /// Offending value.
        value: u64,
    },
    /// The submit URL cannot be normalized onto the submit base.
    #[error("invalid submit URL '{0}'")]
    InvalidSubmitUrl(String),
}

/// A well-known portal location compared against resolved response URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Wraps a URL as an endpoint.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// The full endpoint URL, including any query signature.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// True when `other` points at the same scheme, host, port and path.
    #[must_use]
    pub fn matches_location(&self, other: &Url) -> bool {
        self.url.scheme() == other.scheme()
            && self.url.host_str() == other.host_str()
            && self.url.port_or_known_default() == other.port_or_known_default()
            && self.url.path() == other.path()
    }

    /// True when `other` matches the location and carries the same query.
    #[must_use]
    pub fn matches_exactly(&self, other: &Url) -> bool {
        self.matches_location(other) && self.url.query() == other.query()
    }
}

/// Immutable configuration for one run against the portal.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Login page; its query is the fresh-login signature.
    pub login: Endpoint,
    /// Exam number confirmation page.
    pub exam_number: Endpoint,
    /// Prefix every submit URL is normalized onto.
    pub submit_base: Url,
    /// Outbound User-Agent header.
    pub user_agent: String,
    /// Extra PEM trust roots for the portal's certificate chain.
    pub ca_bundle: Option<PathBuf>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// Namespace for keyring entries.
    pub tool_name: String,
}

impl Default for PortalConfig {
    /// Built-in York endpoints.
    ///
    /// # Panics
    ///
    /// Panics if the built-in URL constants fail to parse, which they never do.
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::with_endpoints(
            Url::parse(DEFAULT_LOGIN_URL).expect("static login URL is valid"),
            Url::parse(DEFAULT_EXAM_NUMBER_URL).expect("static exam number URL is valid"),
            Url::parse(DEFAULT_SUBMIT_BASE).expect("static submit base is valid"),
        )
    }
}

impl PortalConfig {
    /// Builds a config for the given endpoints with default transport settings.
    #[must_use]
    pub fn with_endpoints(login: Url, exam_number: Url, submit_base: Url) -> Self {
        Self {
            login: Endpoint::new(login),
            exam_number: Endpoint::new(exam_number),
            submit_base,
            user_agent: user_agent::default_user_agent(),
            ca_bundle: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            tool_name: user_agent::TOOL_NAME.to_string(),
        }
    }

    /// Applies overrides from a parsed config file on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] for malformed URL values.
    pub fn from_file_config(file: &FileConfig) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(login) = &file.login_url {
            config.login = Endpoint::new(parse_url("login_url", login)?);
        }
        if let Some(exam_number) = &file.exam_number_url {
            config.exam_number = Endpoint::new(parse_url("exam_number_url", exam_number)?);
        }
        if let Some(base) = &file.submit_base {
            config.submit_base = parse_url("submit_base", base)?;
        }
        if let Some(ca_bundle) = &file.ca_bundle {
            config.ca_bundle = Some(ca_bundle.clone());
        }
        if let Some(secs) = file.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.read_timeout_secs {
            config.read_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Normalizes a submit URL against [`PortalConfig::submit_base`].
    ///
    /// # Errors
    ///
    /// See [`resolve_submit_url`].
    pub fn resolve_submit_url(&self, submit_url: &str) -> Result<Url, ConfigError> {
        resolve_submit_url(submit_url, &self.submit_base)
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })
}

/// Normalizes a submit URL so every spelling maps to one absolute URL.
///
/// Accepts a bare path (`2021-2/submit/X/1/A`), a path carrying the base path
/// (`/student/2021-2/...`), the base host with or without scheme, and any
/// leading or trailing slashes. The result is `<base>/<rest>` without a
/// trailing slash.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSubmitUrl`] when nothing is left after the
/// base is stripped, or when a fully qualified URL names a different host.
pub fn resolve_submit_url(submit_url: &str, base: &Url) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidSubmitUrl(submit_url.to_string());
    let base_str = base.as_str().trim_end_matches('/');
    let base_without_scheme = base_str
        .split_once("://")
        .map_or(base_str, |(_, rest)| rest);
    let base_path = base.path().trim_matches('/');

    let mut rest = submit_url.trim();
    let had_scheme = rest.contains("://");
    if let Some((_, after_scheme)) = rest.split_once("://") {
        rest = after_scheme;
    }

    if let Some(stripped) = strip_segment_prefix(rest, base_without_scheme) {
        rest = stripped;
    } else if had_scheme {
        return Err(invalid());
    } else {
        rest = rest.trim_start_matches('/');
        if !base_path.is_empty()
            && let Some(stripped) = strip_segment_prefix(rest, base_path)
        {
            rest = stripped;
        }
    }

    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        return Err(invalid());
    }

    let resolved = format!("{base_str}/{rest}");
    debug!(input = submit_url, resolved = %resolved, "resolved submit URL");
    Url::parse(&resolved).map_err(|_| invalid())
}

/// Strips `prefix` only when it ends on a path-segment boundary.
fn strip_segment_prefix<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = value.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Values read from the optional config file; `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Login page URL including its fresh-login query signature.
    pub login_url: Option<String>,
    /// Exam number confirmation page URL.
    pub exam_number_url: Option<String>,
    /// Submit URL prefix.
    pub submit_base: Option<String>,
    /// PEM bundle with extra trust roots.
    pub ca_bundle: Option<PathBuf>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

/// Loads the config file at `path`; a missing file yields defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using built-in portal settings");
        return Ok(FileConfig::default());
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&raw)
}

/// Parses `key = value` lines. Strings may be quoted; `#` starts a comment.
///
/// # Errors
///
/// Returns [`ConfigError::Syntax`] for malformed lines or unknown keys, and
/// [`ConfigError::InvalidTimeout`] for out-of-range timeouts.
pub fn parse_config_str(raw: &str) -> Result<FileConfig, ConfigError> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                line: line_number,
                reason: "expected key = value".to_string(),
            });
        };
        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "login_url" => cfg.login_url = Some(parse_string_literal(value, line_number)?),
            "exam_number_url" => {
                cfg.exam_number_url = Some(parse_string_literal(value, line_number)?);
            }
            "submit_base" => cfg.submit_base = Some(parse_string_literal(value, line_number)?),
            "ca_bundle" => {
                cfg.ca_bundle = Some(PathBuf::from(parse_string_literal(value, line_number)?));
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs =
                    Some(parse_timeout("connect_timeout_secs", value, line_number)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs =
                    Some(parse_timeout("read_timeout_secs", value, line_number)?);
            }
            other => {
                return Err(ConfigError::Syntax {
                    line: line_number,
                    reason: format!("unknown key `{other}`"),
                });
            }
        }
    }
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(value: &str, line: usize) -> Result<String, ConfigError> {
    if let Some(inner) = value.strip_prefix('"') {
        return inner
            .strip_suffix('"')
            .map(str::to_string)
            .ok_or_else(|| ConfigError::Syntax {
                line,
                reason: "unterminated string".to_string(),
            });
    }
    if value.is_empty() {
        return Err(ConfigError::Syntax {
            line,
            reason: "missing value".to_string(),
        });
    }
    Ok(value.to_string())
}

fn parse_timeout(field: &'static str, value: &str, line: usize) -> Result<u64, ConfigError> {
    let secs = value.parse::<u64>().map_err(|_| ConfigError::Syntax {
        line,
        reason: format!("`{field}` must be a non-negative integer, got '{value}'"),
    })?;
    if !(1..=3600).contains(&secs) {
        return Err(ConfigError::InvalidTimeout { field, value: secs });
    }
    Ok(secs)
}

/// Per-user config directory for this tool.
///
/// # Errors
///
/// Returns [`ConfigError::ConfigDirUnavailable`] if no usable directory is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    resolve_config_dir(
        sanitize_env_path(env::var_os("XDG_CONFIG_HOME")),
        sanitize_env_path(env::var_os("HOME")),
        sanitize_env_path(env::var_os("APPDATA")),
    )
}

/// Default config file path (`<config dir>/config.toml`).
///
/// # Errors
///
/// See [`config_dir`].
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Default cookie jar path (`<config dir>/cookies.json`).
///
/// # Errors
///
/// See [`config_dir`].
pub fn default_cookie_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(COOKIE_FILE_NAME))
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

fn resolve_config_dir(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_data: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(xdg) = xdg_config_home {
        return Ok(xdg.join(CONFIG_DIR_NAME));
    }
    if let Some(home) = home {
        return Ok(home.join(".config").join(CONFIG_DIR_NAME));
    }
    if let Some(app_data) = app_data {
        return Ok(app_data.join(CONFIG_DIR_NAME));
    }
    Err(ConfigError::ConfigDirUnavailable)
}
