//! File digest shown before upload, so the user can match it against the
//! portal's receipt.

use std::path::Path;

use md5::{Digest, Md5};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// MD5 of the file at `path`, as lowercase hex. The portal reports MD5.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be opened or read.
pub async fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
