//! Idempotent, crash-safe enclosure downloads.
//!
//! An episode is skipped without any request when its file already exists.
//! Otherwise the body is streamed into a hidden temp file in the destination
//! directory, synced, and renamed over the final name, so a reader never sees
//! a partial file under the final name.

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use crate::download::{
    EnclosureError, EpisodeFilename, FetchError, HttpClient, RateLimiter, RetryPolicy,
    temp_file_name, with_retry,
};
use crate::model::Item;

/// What happened to one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnclosureOutcome {
    /// The file was written.
    Downloaded {
        /// Final path.
        path: PathBuf,
        /// Body size.
        bytes: u64,
    },
    /// A file for this episode was already present.
    Skipped(PathBuf),
}

/// Downloads `item` into `<root>/<source folder>/`.
///
/// Returns the outcome and the number of attempts made.
///
/// # Errors
///
/// Returns [`EnclosureError`] when the directory cannot be prepared, the
/// request fails after retries, or the body cannot be written.
#[instrument(skip_all, fields(episode = %item, url = %item.enclosure_url))]
pub async fn fetch_enclosure(
    client: &HttpClient,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
    root: &Path,
    item: &Item,
) -> Result<(EnclosureOutcome, u32), EnclosureError> {
    let name = EpisodeFilename::for_item(item);
    let dir = root.join(item.source.folder());
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| EnclosureError::io(&dir, e))?;

    if let Some(existing) = find_existing(&dir, &name).await? {
        return Ok((EnclosureOutcome::Skipped(existing), 0));
    }

    let url = item.enclosure_url.as_str();
    with_retry(policy, limiter, url, || download_once(client, &dir, &name, url))
        .await
        .map_err(|(e, _)| e)
}

async fn download_once(
    client: &HttpClient,
    dir: &Path,
    name: &EpisodeFilename,
    url: &str,
) -> Result<EnclosureOutcome, EnclosureError> {
    let response = client.get(url).await?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let final_name = name.file_name_for_content_type(content_type);
    let final_path = dir.join(&final_name);

    // The extension may only now be known.
    if path_exists(&final_path).await? {
        debug!(path = %final_path.display(), "exists after resolving extension");
        return Ok(EnclosureOutcome::Skipped(final_path));
    }

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| FetchError::network(url, e)));
    let bytes = write_atomically(dir, &final_name, body).await?;

    Ok(EnclosureOutcome::Downloaded {
        path: final_path,
        bytes,
    })
}

/// Locates a file that already holds this episode.
///
/// With an unresolved extension any non-temp file sharing the stem counts.
async fn find_existing(
    dir: &Path,
    name: &EpisodeFilename,
) -> Result<Option<PathBuf>, EnclosureError> {
    if let Some(file_name) = name.file_name() {
        let path = dir.join(file_name);
        return Ok(path_exists(&path).await?.then_some(path));
    }

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| EnclosureError::io(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| EnclosureError::io(dir, e))?
    {
        if entry
            .file_name()
            .to_str()
            .is_some_and(|n| name.matches_existing(n))
        {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

async fn path_exists(path: &Path) -> Result<bool, EnclosureError> {
    fs::try_exists(path)
        .await
        .map_err(|e| EnclosureError::io(path, e))
}

/// Streams `body` into `dir/final_name` through a temp file and a rename.
///
/// On any failure the temp file is removed and `final_name` is left
/// untouched. Returns the number of bytes written.
pub(crate) async fn write_atomically<S, B>(
    dir: &Path,
    final_name: &str,
    body: S,
) -> Result<u64, EnclosureError>
where
    S: Stream<Item = Result<B, FetchError>>,
    B: AsRef<[u8]>,
{
    let temp_path = dir.join(temp_file_name(final_name));
    let final_path = dir.join(final_name);

    let result = async {
        let bytes = stream_to_temp(&temp_path, body).await?;
        fs::rename(&temp_path, &final_path)
            .await
            .map_err(|e| EnclosureError::io(&final_path, e))?;
        Ok(bytes)
    }
    .await;

    if result.is_err() {
        debug!(path = %temp_path.display(), "cleaning up temp file after error");
        match fs::remove_file(&temp_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                debug!(path = %temp_path.display(), error = %e, "could not remove temp file");
            }
            _ => {}
        }
    }
    result
}

async fn stream_to_temp<S, B>(path: &Path, body: S) -> Result<u64, EnclosureError>
where
    S: Stream<Item = Result<B, FetchError>>,
    B: AsRef<[u8]>,
{
    let file: File = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| EnclosureError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut body = std::pin::pin!(body);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| EnclosureError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| EnclosureError::io(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| EnclosureError::io(path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::DateTime;
    use futures_util::stream;
    use tempfile::TempDir;

    use super::*;
    use crate::model::Source;

    fn item(mime: Option<&str>) -> Item {
        Item {
            source: Arc::new(Source::new("rss", "Show", "Show", None, "https://x/feed")),
            guid: "g".to_string(),
            title: "Pilot".to_string(),
            link: "https://x/1".to_string(),
            published: DateTime::parse_from_rfc3339("2024-03-04T05:06:07Z").unwrap(),
            enclosure_url: "https://x/1.mp3".to_string(),
            enclosure_type: mime.map(str::to_string),
        }
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_write_atomically_renames_complete_body() {
        let dir = TempDir::new().unwrap();
        let body = stream::iter(vec![
            Ok::<_, FetchError>(b"hello ".to_vec()),
            Ok(b"world".to_vec()),
        ]);

        let bytes = write_atomically(dir.path(), "ep.mp3", body).await.unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read(dir.path().join("ep.mp3")).unwrap(), b"hello world");
        assert_eq!(dir_names(dir.path()), ["ep.mp3"]);
    }

    #[tokio::test]
    async fn test_write_atomically_failure_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let body = stream::iter(vec![
            Ok(b"partial".to_vec()),
            Err(FetchError::timeout("https://x/1.mp3")),
        ]);

        let result = write_atomically(dir.path(), "ep.mp3", body).await;

        assert!(matches!(result, Err(EnclosureError::Fetch(_))));
        assert!(dir_names(dir.path()).is_empty(), "no final or temp file");
    }

    #[tokio::test]
    async fn test_find_existing_known_extension() {
        let dir = TempDir::new().unwrap();
        let name = EpisodeFilename::for_item(&item(Some("audio/mpeg")));
        assert_eq!(find_existing(dir.path(), &name).await.unwrap(), None);

        std::fs::write(dir.path().join("Pilot [2024-03-04].mp3"), b"x").unwrap();
        assert!(find_existing(dir.path(), &name).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_existing_unresolved_extension_ignores_temp_files() {
        let dir = TempDir::new().unwrap();
        let name = EpisodeFilename::for_item(&item(None));

        std::fs::write(
            dir.path().join(".Pilot [2024-03-04].bin.0000abcd.part"),
            b"x",
        )
        .unwrap();
        assert_eq!(find_existing(dir.path(), &name).await.unwrap(), None);

        std::fs::write(dir.path().join("Pilot [2024-03-04].m4a"), b"x").unwrap();
        assert_eq!(
            find_existing(dir.path(), &name).await.unwrap(),
            Some(dir.path().join("Pilot [2024-03-04].m4a"))
        );
    }

    #[tokio::test]
    async fn test_existing_file_skips_without_network() {
        let root = TempDir::new().unwrap();
        let item = item(Some("audio/mpeg"));
        let show = root.path().join("Show");
        std::fs::create_dir_all(&show).unwrap();
        std::fs::write(show.join("Pilot [2024-03-04].mp3"), b"old").unwrap();

        // The enclosure URL is unreachable; a skip must not touch it.
        let (outcome, attempts) = fetch_enclosure(
            &HttpClient::new(),
            &RateLimiter::disabled(),
            &RetryPolicy::no_retry(),
            root.path(),
            &item,
        )
        .await
        .unwrap();

        assert_eq!(attempts, 0);
        assert_eq!(
            outcome,
            EnclosureOutcome::Skipped(show.join("Pilot [2024-03-04].mp3"))
        );
        assert_eq!(std::fs::read(show.join("Pilot [2024-03-04].mp3")).unwrap(), b"old");
    }
}
