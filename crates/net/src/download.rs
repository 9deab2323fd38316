//! Atomic archive download

use crate::client::{map_reqwest_error, NetClient};
use ferry_errors::{Error, StorageError};
use ferry_hash::{Checksum, StreamingChecksum};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A completed download
#[derive(Debug, Clone)]
pub struct Download {
    pub path: PathBuf,
    pub size: u64,
    /// Digest of the bytes written; informational only
    pub checksum: Checksum,
}

/// Stream `url` into `dest`
///
/// Bytes land in a temporary file next to `dest` and are renamed into place
/// only after the body is fully written and synced. Dropping the returned
/// future mid-transfer deletes the temporary file, so `dest` is either absent
/// or complete.
///
/// # Errors
///
/// Returns a `NetworkError` for transport failures and non-success statuses,
/// and a `StorageError` if the destination cannot be written.
pub async fn download_to(client: &NetClient, url: &str, dest: &Path) -> Result<Download, Error> {
    let parent = dest.parent().ok_or_else(|| StorageError::InvalidPath {
        path: dest.display().to_string(),
    })?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, parent))?;

    let response = client.get(url).await?;

    let temp = tempfile::Builder::new()
        .prefix(".ferry-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| StorageError::from_io_with_path(&e, parent))?;
    let (std_file, temp_path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(std_file);

    let mut hasher = StreamingChecksum::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| map_reqwest_error(url, &e))?;
        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &temp_path))?;
    }

    file.flush()
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, &temp_path))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::from_io_with_path(&e, &temp_path))?;
    drop(file);

    let size = hasher.len();
    temp_path.persist(dest).map_err(|e| StorageError::IoError {
        message: format!("failed to move download into {}: {}", dest.display(), e.error),
    })?;

    Ok(Download {
        path: dest.to_path_buf(),
        size,
        checksum: hasher.finalize(),
    })
}
