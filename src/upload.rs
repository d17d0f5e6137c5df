//! The authenticated upload step.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use url::Url;

use crate::html::AuthToken;
use crate::transport::{PageResponse, SessionTransport, TransportError};

/// Multipart field carrying the portal token.
pub const TOKEN_FIELD: &str = "_token";
/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Errors locating the file or uploading it.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The path does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    /// The path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),
    /// The path has no usable final component.
    #[error("cannot determine a file name for {0}")]
    NoFileName(PathBuf),
    /// Reading file metadata failed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The upload request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A file validated for upload: absolute path, own name, and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    path: PathBuf,
    file_name: String,
    len: u64,
}

impl UploadFile {
    /// Resolves `path` to an absolute path and checks it is a regular file.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::FileNotFound`] for a missing path and
    /// [`UploadError::NotAFile`] for directories and other non-files.
    pub fn open(path: &Path) -> Result<Self, UploadError> {
        let path = match path.canonicalize() {
            Ok(path) => path,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::FileNotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(UploadError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let metadata = path.metadata().map_err(|source| UploadError::Io {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(UploadError::NotAFile(path));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::NoFileName(path.clone()))?;

        Ok(Self {
            path,
            file_name,
            len: metadata.len(),
        })
    }

    /// Absolute path on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name sent as the multipart file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes at validation time.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file was empty at validation time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Uploads `file` to `target` with the portal token, in one multipart POST.
///
/// # Errors
///
/// Returns [`UploadError::Transport`] on network failure or a non-success
/// status.
#[instrument(skip(transport, token, target, file), fields(url = %target, file = %file.file_name()))]
pub async fn upload_file(
    transport: &dyn SessionTransport,
    token: &AuthToken,
    target: &Url,
    file: &UploadFile,
) -> Result<PageResponse, UploadError> {
    info!(bytes = file.len(), "uploading {}", file.file_name());
    let fields = [(TOKEN_FIELD.to_string(), token.as_str().to_string())];
    let response = transport.post_multipart(target, &fields, file).await?;
    info!(status = response.status, "upload accepted");
    Ok(response)
}
