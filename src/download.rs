//! Streaming artifact download with progress and cancellation.
//!
//! The artifact streams into a `.partial` file and is renamed into its
//! stable destination only on success, overwriting any stale previous
//! download of the same name. Cancellation and mid-transfer failure both
//! discard the partial file; there is no resume support.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("fsocial-updater/", env!("CARGO_PKG_VERSION"));
const CHUNK_SIZE: usize = 64 * 1024;

// Progress callbacks are coalesced so a fast transfer does not flood the
// UI channel: at most one report per interval or per megabyte, plus a
// guaranteed first and final report.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_BYTES: u64 = 1024 * 1024;

/// First-class cancellation token for an in-flight download.
///
/// Cloneable and thread-safe; the UI holds one clone and the transfer
/// loop polls another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress observer: `(bytes_downloaded, total_bytes)`. Total is `None`
/// when the server sent no Content-Length.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Streams release artifacts into the configured download directory.
pub struct ArtifactDownloader {
    agent: ureq::Agent,
    dest_dir: PathBuf,
}

impl ArtifactDownloader {
    /// Build a downloader from the updater configuration.
    pub fn new(config: &UpdaterConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(config.read_timeout_secs))
            .build();
        Self {
            agent,
            dest_dir: config.download_dir.clone(),
        }
    }

    /// Download `url` into the destination directory as `file_name`.
    ///
    /// On success the finished file is moved (renamed, not copied) over
    /// any stale download of the same name and its path returned. On
    /// cancellation or failure the partial file is removed.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Cancelled`] if the token fired mid-transfer,
    /// [`UpdateError::Download`] for network or local write failures.
    pub fn download(
        &self,
        url: &str,
        file_name: &str,
        cancel: &CancelToken,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dest_dir)
            .map_err(|e| UpdateError::Download(format!("cannot create download dir: {e}")))?;

        let final_path = self.dest_dir.join(file_name);
        let partial_path = self.dest_dir.join(format!("{file_name}.partial"));

        tracing::info!(url, dest = %final_path.display(), "starting artifact download");
        let resp = self
            .agent
            .get(url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| UpdateError::Download(e.to_string()))?;

        let total_bytes = resp
            .header("Content-Length")
            .and_then(|len| len.parse::<u64>().ok());

        let mut reader = resp.into_reader();
        let result = stream_to_file(
            &mut reader,
            &partial_path,
            total_bytes,
            cancel,
            on_progress,
        );

        match result {
            Ok(()) => {
                std::fs::rename(&partial_path, &final_path).map_err(|e| {
                    let _ = std::fs::remove_file(&partial_path);
                    UpdateError::Download(format!(
                        "cannot move download into {}: {e}",
                        final_path.display()
                    ))
                })?;
                tracing::info!(path = %final_path.display(), "artifact download complete");
                Ok(final_path)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&partial_path);
                Err(e)
            }
        }
    }
}

/// Copy the response body into `partial_path`, polling the cancel token
/// between chunks and coalescing progress reports.
fn stream_to_file(
    reader: &mut dyn Read,
    partial_path: &Path,
    total_bytes: Option<u64>,
    cancel: &CancelToken,
    on_progress: ProgressFn<'_>,
) -> Result<()> {
    let mut file = std::fs::File::create(partial_path)
        .map_err(|e| UpdateError::Download(format!("cannot create partial file: {e}")))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let mut last_report_bytes: u64 = 0;
    let mut last_report_at = Instant::now();
    let mut reported = false;

    loop {
        if cancel.is_cancelled() {
            tracing::info!("download cancelled, discarding partial file");
            return Err(UpdateError::Cancelled);
        }

        let n = reader
            .read(&mut buf)
            .map_err(|e| UpdateError::Download(format!("read failed mid-transfer: {e}")))?;
        if n == 0 {
            break;
        }

        file.write_all(&buf[..n])
            .map_err(|e| UpdateError::Download(format!("write failed: {e}")))?;
        written += n as u64;

        let due = !reported
            || written - last_report_bytes >= PROGRESS_BYTES
            || last_report_at.elapsed() >= PROGRESS_INTERVAL;
        if due {
            on_progress(written, total_bytes);
            reported = true;
            last_report_bytes = written;
            last_report_at = Instant::now();
        }
    }

    file.flush()
        .map_err(|e| UpdateError::Download(format!("flush failed: {e}")))?;
    // Final report so the UI always sees 100%.
    on_progress(written, total_bytes);
    Ok(())
}
