//! Download-root housekeeping run once before the pipeline starts.

use std::io;
use std::path::Path;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::download::is_temp_file;

/// Deletes everything inside `root`, creating it if absent.
///
/// The root itself is kept, so it may be the working directory.
///
/// # Errors
///
/// Returns the I/O error if an entry cannot be removed.
pub async fn reset_directory(root: &Path) -> io::Result<()> {
    fs::create_dir_all(root).await?;

    let mut removed = 0usize;
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        removed += 1;
    }

    info!(root = %root.display(), removed, "download directory reset");
    Ok(())
}

/// Removes temp files left in `<root>/<folder>/` by an interrupted run.
///
/// Returns how many were removed. Files that cannot be deleted are logged and
/// left in place.
///
/// # Errors
///
/// Returns the I/O error if `root` cannot be listed.
pub async fn remove_orphaned_temp_files(root: &Path) -> io::Result<usize> {
    let mut removed = 0usize;
    let mut folders = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    while let Some(folder) = folders.next_entry().await? {
        if !folder.file_type().await?.is_dir() {
            continue;
        }
        let mut entries = fs::read_dir(folder.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_str().is_some_and(is_temp_file) {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed orphaned temp file");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove temp file"),
            }
        }
    }

    if removed > 0 {
        info!(removed, "cleaned up interrupted downloads");
    }
    Ok(removed)
}
