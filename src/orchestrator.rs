//! Update orchestrator: the state machine driving check → download →
//! mount → locate → install → relaunch.
//!
//! An explicitly constructed instance owned by whatever composes the
//! application; there are no ambient globals. All I/O and subprocess
//! work runs on a background worker thread. The UI observes the session
//! snapshot and the [`UpdateEvent`] channel; presentation (dialog,
//! notification, log line) is entirely the UI layer's decision.

use crate::config::UpdaterConfig;
use crate::download::ArtifactDownloader;
use crate::error::{Result, UpdateError};
use crate::feed::{ReleaseFetcher, ReleaseInfo};
use crate::install::Installer;
use crate::locate::locate_bundle;
use crate::mount::{DmgMounter, MountHandle};
use crate::relaunch::{Relauncher, Terminator, exit_terminator};
use crate::session::{UpdatePhase, UpdateSession};
use crate::tools::{CommandRunner, ToolRunner};
use crate::version::VersionNumber;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Structured state transitions emitted to the UI thread.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// The session moved to a new phase.
    PhaseChanged { phase: UpdatePhase },
    /// A newer release is available. `releases_page` is the
    /// human-browsable fallback for releases that ship no installable
    /// artifact for this platform.
    UpdateAvailable {
        release: ReleaseInfo,
        releases_page: String,
    },
    /// The running version is current.
    UpToDate { current: VersionNumber },
    /// The metadata check failed. Silent by default; no forced dialog.
    CheckFailed { message: String },
    /// Download progress as a fraction in `[0, 1]`.
    DownloadProgress { fraction: f32 },
    /// A pipeline step failed. When an artifact survived the failure its
    /// path is included so the UI can offer a manual install.
    Failed {
        message: String,
        manual_artifact: Option<PathBuf>,
    },
    /// The user cancelled during download.
    Cancelled,
    /// The new instance launched; handoff is imminent.
    Done,
}

struct Inner {
    config: UpdaterConfig,
    runner: Arc<dyn ToolRunner>,
    session: Mutex<UpdateSession>,
    events: Sender<UpdateEvent>,
    terminator: Terminator,
}

impl Inner {
    fn emit(&self, event: UpdateEvent) {
        // The UI may have dropped the receiver; events are best-effort.
        let _ = self.events.send(event);
    }

    fn set_phase(&self, phase: UpdatePhase) {
        if let Ok(mut session) = self.session.lock() {
            session.phase = phase;
        }
        self.emit(UpdateEvent::PhaseChanged { phase });
    }

    fn fail(&self, phase_before: UpdatePhase, error: &UpdateError, manual_artifact: Option<PathBuf>) {
        tracing::warn!(?phase_before, %error, "update pipeline failed");
        if let Ok(mut session) = self.session.lock() {
            session.fail(phase_before, error);
        }
        self.emit(UpdateEvent::PhaseChanged {
            phase: UpdatePhase::Failed,
        });
        self.emit(UpdateEvent::Failed {
            message: error.to_string(),
            manual_artifact,
        });
    }
}

/// Drives the single in-flight update session.
pub struct UpdateOrchestrator {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateOrchestrator {
    /// Build an orchestrator with the real tool runner and process
    /// terminator. Returns the event receiver for the UI thread.
    pub fn new(config: UpdaterConfig) -> (Self, Receiver<UpdateEvent>) {
        Self::with_parts(config, Arc::new(CommandRunner), exit_terminator())
    }

    /// Build an orchestrator with injected tool runner and terminator.
    /// This is how tests run the full pipeline without spawning real
    /// subprocesses or exiting the harness.
    pub fn with_parts(
        config: UpdaterConfig,
        runner: Arc<dyn ToolRunner>,
        terminator: Terminator,
    ) -> (Self, Receiver<UpdateEvent>) {
        let (events, receiver) = unbounded();
        let inner = Arc::new(Inner {
            config,
            runner,
            session: Mutex::new(UpdateSession::default()),
            events,
            terminator,
        });
        let orchestrator = Self {
            inner,
            worker: Mutex::new(None),
        };
        (orchestrator, receiver)
    }

    /// Snapshot of the observable session state.
    pub fn snapshot(&self) -> UpdateSession {
        self.inner
            .session
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Start a metadata check on the background worker.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Busy`] if a session is already in flight.
    pub fn request_check(&self) -> Result<()> {
        {
            let mut session = self
                .inner
                .session
                .lock()
                .map_err(|_| UpdateError::Busy)?;
            session.begin_check()?;
        }
        self.inner.emit(UpdateEvent::PhaseChanged {
            phase: UpdatePhase::Checking,
        });

        let inner = Arc::clone(&self.inner);
        self.spawn_worker("update-check", move || run_check(&inner));
        Ok(())
    }

    /// Start downloading and installing the available release.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Busy`] if a session is in flight, or
    /// [`UpdateError::NothingToInstall`] if the last check did not yield
    /// an installable release.
    pub fn request_install(&self) -> Result<()> {
        let release = {
            let mut session = self
                .inner
                .session
                .lock()
                .map_err(|_| UpdateError::Busy)?;
            session.begin_install()?
        };
        self.inner.emit(UpdateEvent::PhaseChanged {
            phase: UpdatePhase::Downloading,
        });

        let inner = Arc::clone(&self.inner);
        self.spawn_worker("update-install", move || run_install(&inner, release));
        Ok(())
    }

    /// Request cancellation of the in-flight session. Honored during
    /// download and at the pre-mount boundary; once installing has
    /// begun the request is recorded but not acted on.
    pub fn request_cancel(&self) {
        let Ok(session) = self.inner.session.lock() else {
            return;
        };
        if session.phase.is_busy() {
            tracing::info!(phase = ?session.phase, "cancel requested");
            session.cancel.cancel();
        }
    }

    /// Block until the current background worker finishes. Hosts use
    /// this to synchronize shutdown; tests use it to await pipeline
    /// completion.
    pub fn join_worker(&self) {
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn spawn_worker<F>(&self, name: &str, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Ok(mut worker) = self.worker.lock() {
            // The begin_* guard proved the previous session is terminal,
            // but its thread may still be sleeping out the handoff delay
            // under a host terminator. Reap it if finished, otherwise
            // detach rather than stall the caller.
            if let Some(handle) = worker.take() {
                if handle.is_finished() {
                    let _ = handle.join();
                }
            }
            *worker = std::thread::Builder::new()
                .name(name.to_owned())
                .spawn(f)
                .ok();
        }
    }
}

fn run_check(inner: &Inner) {
    let fetcher = ReleaseFetcher::new(&inner.config);
    let current = VersionNumber::parse(&inner.config.current_version);

    match fetcher.fetch_latest() {
        Ok(release) => {
            if release.version.is_newer_than(&current) {
                tracing::info!(tag = %release.tag, "update available");
                if let Ok(mut session) = inner.session.lock() {
                    session.phase = UpdatePhase::UpdateAvailable;
                    session.release = Some(release.clone());
                }
                inner.emit(UpdateEvent::PhaseChanged {
                    phase: UpdatePhase::UpdateAvailable,
                });
                inner.emit(UpdateEvent::UpdateAvailable {
                    release,
                    releases_page: inner.config.releases_page_url(),
                });
            } else {
                tracing::info!(%current, "already up to date");
                if let Ok(mut session) = inner.session.lock() {
                    session.phase = UpdatePhase::UpToDate;
                    session.release = Some(release);
                }
                inner.emit(UpdateEvent::PhaseChanged {
                    phase: UpdatePhase::UpToDate,
                });
                inner.emit(UpdateEvent::UpToDate { current });
            }
        }
        Err(error) => {
            // Checks may run unattended at startup; log, do not alarm.
            tracing::warn!(%error, "release check failed");
            if let Ok(mut session) = inner.session.lock() {
                session.fail(UpdatePhase::Checking, &error);
            }
            inner.emit(UpdateEvent::PhaseChanged {
                phase: UpdatePhase::CheckFailed,
            });
            inner.emit(UpdateEvent::CheckFailed {
                message: error.to_string(),
            });
        }
    }
}

fn run_install(inner: &Inner, release: ReleaseInfo) {
    // begin_install only hands out installable releases.
    let Some(url) = release.artifact_url.clone() else {
        inner.fail(UpdatePhase::Downloading, &UpdateError::NothingToInstall, None);
        return;
    };
    let file_name = release
        .artifact_name
        .clone()
        .unwrap_or_else(|| format!("fsocial-{}.dmg", release.version));

    let cancel = inner
        .session
        .lock()
        .map(|s| s.cancel.clone())
        .unwrap_or_default();

    // Step 1: download.
    let downloader = ArtifactDownloader::new(&inner.config);
    let on_progress = |bytes: u64, total: Option<u64>| {
        let fraction = match total {
            Some(total) if total > 0 => (bytes as f64 / total as f64).clamp(0.0, 1.0) as f32,
            _ => 0.0,
        };
        if let Ok(mut session) = inner.session.lock() {
            session.progress = fraction;
        }
        inner.emit(UpdateEvent::DownloadProgress { fraction });
    };

    let artifact = match downloader.download(&url, &file_name, &cancel, &on_progress) {
        Ok(path) => path,
        Err(UpdateError::Cancelled) => {
            finish_cancelled(inner);
            return;
        }
        Err(error) => {
            inner.fail(UpdatePhase::Downloading, &error, None);
            return;
        }
    };
    if let Ok(mut session) = inner.session.lock() {
        session.artifact_path = Some(artifact.clone());
    }

    // Pre-mount boundary: a cancel that raced the end of the download is
    // still safe to honor, since nothing has touched the installed app.
    if cancel.is_cancelled() {
        finish_cancelled(inner);
        return;
    }

    // Step 2: mount.
    inner.set_phase(UpdatePhase::Mounting);
    let mounter = DmgMounter::new(Arc::clone(&inner.runner), inner.config.mount_point.clone());
    let mut handle = match mounter.mount(&artifact) {
        Ok(handle) => handle,
        Err(error) => {
            // Artifact is kept on disk for manual use.
            inner.fail(UpdatePhase::Mounting, &error, Some(artifact));
            return;
        }
    };
    if let Ok(mut session) = inner.session.lock() {
        session.mount_point = Some(handle.mount_point().to_path_buf());
    }

    // Step 3: locate the bundle inside the image.
    let bundle = match locate_bundle(handle.mount_point(), &inner.config.bundle_name) {
        Some(bundle) => bundle,
        None => {
            let error = UpdateError::Locate(format!(
                "{} not present in the downloaded image",
                inner.config.bundle_name
            ));
            unmount_quietly(inner, &mounter, &mut handle);
            inner.fail(UpdatePhase::Mounting, &error, Some(artifact));
            return;
        }
    };

    // Step 4: install. Cancellation is refused from here on.
    inner.set_phase(UpdatePhase::Installing);
    let installer = Installer::new(Arc::clone(&inner.runner));
    let dest = inner.config.installed_bundle_path();
    if let Err(error) = installer.install(&bundle, &dest) {
        unmount_quietly(inner, &mounter, &mut handle);
        open_for_manual_install(inner, &artifact);
        inner.fail(UpdatePhase::Installing, &error, Some(artifact));
        return;
    }
    unmount_quietly(inner, &mounter, &mut handle);

    // Step 5: relaunch. On failure the old instance keeps running; the
    // current process must never terminate here.
    inner.set_phase(UpdatePhase::Relaunching);
    let relauncher = Relauncher::new(Arc::clone(&inner.runner));
    if let Err(error) = relauncher.relaunch(&dest) {
        inner.fail(UpdatePhase::Relaunching, &error, None);
        return;
    }

    inner.set_phase(UpdatePhase::Done);
    inner.emit(UpdateEvent::Done);
    (inner.terminator)(inner.config.handoff_delay());
}

fn finish_cancelled(inner: &Inner) {
    tracing::info!("update cancelled");
    if let Ok(mut session) = inner.session.lock() {
        session.phase = UpdatePhase::Cancelled;
    }
    inner.emit(UpdateEvent::PhaseChanged {
        phase: UpdatePhase::Cancelled,
    });
    inner.emit(UpdateEvent::Cancelled);
}

/// Detach before surfacing any failure. A detach error must not mask
/// the failure that brought us here, so it is logged and swallowed.
fn unmount_quietly(inner: &Inner, mounter: &DmgMounter, handle: &mut MountHandle) {
    if let Err(error) = mounter.unmount(handle) {
        tracing::warn!(%error, "detach after pipeline step failed");
    }
    if let Ok(mut session) = inner.session.lock() {
        session.mount_point = None;
    }
}

/// Manual fallback after a failed install: open the artifact so the
/// user can drag-install by hand instead of being left with an error.
fn open_for_manual_install(inner: &Inner, artifact: &std::path::Path) {
    let artifact_arg = artifact.to_string_lossy().into_owned();
    match inner.runner.run("open", &[&artifact_arg]) {
        Ok(output) if output.success() => {}
        Ok(output) => {
            tracing::warn!(stderr = %output.stderr_brief(), "cannot open artifact for manual install");
        }
        Err(error) => {
            tracing::warn!(%error, "cannot open artifact for manual install");
        }
    }
}
