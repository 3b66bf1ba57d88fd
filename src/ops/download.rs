//! File downloader: stream a URL's body into a file in a target directory.
//!
//! The file takes the last path segment of the URL as its name (the host
//! when the path is empty). Two URLs ending in the same segment write the
//! same file; the later download wins.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::Operation;

use super::FetchError;
use super::http::HttpClient;

/// Local file name for `url`.
pub fn file_name_for(url: &str) -> Result<String, FetchError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    let segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string);

    match segment.or_else(|| parsed.host_str().map(str::to_string)) {
        Some(name) if name != "." && name != ".." => Ok(name),
        _ => Err(FetchError::NoFileName(url.to_string())),
    }
}

/// Completed-download counter shared by every task of one dispatch.
#[derive(Debug)]
pub struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    /// Count one finished download; returns the new count.
    pub fn complete_one(&self) -> usize {
        self.done.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Called with `(done, total)` after each completed download.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Operation mapping a URL to the path of the downloaded file.
#[derive(Clone)]
pub struct FileDownloader {
    client: HttpClient,
    dir: PathBuf,
    progress: Arc<Progress>,
    on_progress: Option<ProgressFn>,
}

impl fmt::Debug for FileDownloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDownloader")
            .field("dir", &self.dir)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl FileDownloader {
    pub fn new(client: HttpClient, dir: impl Into<PathBuf>, total: usize) -> Self {
        Self {
            client,
            dir: dir.into(),
            progress: Arc::new(Progress::new(total)),
            on_progress: None,
        }
    }

    /// Report `(done, total)` to `f` after every completed download.
    pub fn on_progress(mut self, f: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Removes the file at its path when dropped, unless committed.
///
/// Covers every way a download can stop early: an error return, the
/// cancel branch, and the task being aborted mid-write.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn commit(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "partial file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "partial file not removed"),
        }
    }
}

impl Operation<String> for FileDownloader {
    type Output = PathBuf;
    type Error = FetchError;

    fn call(
        &self,
        url: String,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<PathBuf, FetchError>> + Send {
        let client = self.client.clone();
        let dir = self.dir.clone();
        let progress = Arc::clone(&self.progress);
        let on_progress = self.on_progress.clone();
        async move {
            let name = file_name_for(&url)?;
            let mut response = client.get(&url, &cancel).await?;

            let path = dir.join(name);
            // Declared before the file so the handle closes first.
            let partial = PartialFile::new(path.clone());
            let mut file = File::create(&path).await?;
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    chunk = response.chunk() => chunk?,
                };
                match chunk {
                    Some(bytes) => file.write_all(&bytes).await?,
                    None => break,
                }
            }
            file.flush().await?;
            drop(file);
            partial.commit();

            let done = progress.complete_one();
            debug!(url = %url, path = %path.display(), done, total = progress.total(), "downloaded");
            if let Some(report) = on_progress {
                report(done, progress.total());
            }
            Ok(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_last_path_segment() {
        assert_eq!(
            file_name_for("https://golang.org/doc/gopher/frontpage.png").unwrap(),
            "frontpage.png"
        );
        assert_eq!(
            file_name_for("https://example.com/index.html?x=1").unwrap(),
            "index.html"
        );
    }

    #[test]
    fn trailing_slash_and_bare_host() {
        assert_eq!(file_name_for("https://example.com/docs/").unwrap(), "docs");
        assert_eq!(file_name_for("https://example.com").unwrap(), "example.com");
    }

    #[test]
    fn unparseable_url_is_rejected() {
        assert!(matches!(
            file_name_for("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn uncommitted_partial_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.bin");
        let dropped = dir.path().join("dropped.bin");
        std::fs::write(&kept, b"done").unwrap();
        std::fs::write(&dropped, b"half").unwrap();

        PartialFile::new(kept.clone()).commit();
        drop(PartialFile::new(dropped.clone()));

        assert!(kept.exists());
        assert!(!dropped.exists());
    }

    #[test]
    fn progress_counts_up() {
        let progress = Progress::new(3);
        assert_eq!(progress.complete_one(), 1);
        assert_eq!(progress.complete_one(), 2);
        assert_eq!(progress.done(), 2);
        assert_eq!(progress.total(), 3);
    }
}
