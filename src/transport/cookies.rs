//! Cookie jar persistence between runs.
//!
//! The jar is stored as JSON through `cookie_store`'s serde support, keyed by
//! (domain, path, name). Session-only cookies are written and read back only
//! when `ignore_discard` is set, which lets a partially completed login be
//! resumed by the next run.

use std::convert::Infallible;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use cookie_store::CookieStore;
use tracing::{debug, instrument};

/// Errors reading or writing the cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieFileError {
    /// Filesystem I/O failed.
    #[error("cookie file {path}: {source}")]
    Io {
        /// Cookie file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file content is not a valid cookie jar.
    #[error("cookie file {path} is not a valid cookie jar: {reason}")]
    Format {
        /// Cookie file path.
        path: PathBuf,
        /// Parser error text.
        reason: String,
    },
    /// The in-memory jar lock was poisoned by a panicking request.
    #[error("cookie jar lock poisoned")]
    Poisoned,
}

impl CookieFileError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What loading the cookie file found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieLoad {
    /// The file existed; this many cookies were loaded.
    Loaded(usize),
    /// No cookie file yet; the session starts empty.
    Missing,
}

/// Reads a cookie jar from `path`.
///
/// Expired cookies are skipped. Without `ignore_discard`, session-only cookies
/// in the file are dropped as well.
///
/// # Errors
///
/// Returns [`CookieFileError`] when the file exists but cannot be read or
/// parsed. A missing file yields an empty store and [`CookieLoad::Missing`].
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn load_cookie_store(
    path: &Path,
    ignore_discard: bool,
) -> Result<(CookieStore, CookieLoad), CookieFileError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!("no cookie file");
            return Ok((CookieStore::default(), CookieLoad::Missing));
        }
        Err(error) => return Err(CookieFileError::io(path, error)),
    };

    let store = cookie_store::serde::json::load(BufReader::new(file)).map_err(|error| {
        CookieFileError::Format {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    })?;

    let store = if ignore_discard {
        store
    } else {
        without_session_cookies(&store)
    };

    let count = store.iter_unexpired().count();
    debug!(count, ignore_discard, "loaded cookie jar");
    Ok((store, CookieLoad::Loaded(count)))
}

/// Writes `store` to `path`, creating parent directories.
///
/// With `ignore_discard`, session-only cookies are written too. On unix the
/// file is made readable by the owner only, since it holds login sessions.
///
/// # Errors
///
/// Returns [`CookieFileError`] when the file cannot be written.
#[instrument(level = "debug", skip(store), fields(path = %path.display()))]
pub fn save_cookie_store(
    store: &CookieStore,
    path: &Path,
    ignore_discard: bool,
) -> Result<usize, CookieFileError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|error| CookieFileError::io(path, error))?;
    }

    let file = File::create(path).map_err(|error| CookieFileError::io(path, error))?;
    let mut writer = BufWriter::new(file);
    let written = if ignore_discard {
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(store, &mut writer)
            .map(|()| store.iter_any().count())
    } else {
        cookie_store::serde::json::save(store, &mut writer)
            .map(|()| store.iter_unexpired().filter(|c| c.is_persistent()).count())
    }
    .map_err(|error| CookieFileError::Format {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    writer
        .flush()
        .map_err(|error| CookieFileError::io(path, error))?;
    set_owner_only_permissions(path)?;

    debug!(written, ignore_discard, "saved cookie jar");
    Ok(written)
}

/// Deletes the cookie file. Returns `false` when there was no file.
///
/// # Errors
///
/// Returns [`CookieFileError::Io`] for failures other than the file missing.
pub fn delete_cookie_file(path: &Path) -> Result<bool, CookieFileError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(CookieFileError::io(path, error)),
    }
}

fn without_session_cookies(store: &CookieStore) -> CookieStore {
    let persistent = store
        .iter_any()
        .filter(|cookie| cookie.is_persistent())
        .cloned()
        .map(Ok::<_, Infallible>);
    match CookieStore::from_cookies(persistent, false) {
        Ok(filtered) => filtered,
        Err(never) => match never {},
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<(), CookieFileError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|error| CookieFileError::io(path, error))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<(), CookieFileError> {
    Ok(())
}
