//! The single in-flight update session and its state machine.
//!
//! At most one session is active at a time. A second check or install
//! request while one is in flight is rejected, not queued. Terminal
//! phases reset to `Idle` when the next request is accepted.

use crate::download::CancelToken;
use crate::error::UpdateError;
use crate::feed::ReleaseInfo;
use std::path::PathBuf;

/// Externally observable phase of the update pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// No session is active.
    Idle,
    /// Fetching release metadata.
    Checking,
    /// A newer release was found; waiting for an install request.
    UpdateAvailable,
    /// The running version is current.
    UpToDate,
    /// The metadata check failed. Silent by default: checks may run
    /// automatically at startup, so the UI should not force a dialog.
    CheckFailed,
    /// Streaming the artifact to disk.
    Downloading,
    /// Attaching the disk image and locating the bundle.
    Mounting,
    /// Replacing the installed bundle. Cancellation is refused from here
    /// on to avoid a half-replaced install.
    Installing,
    /// Starting the new instance.
    Relaunching,
    /// The new instance launched; handoff is imminent.
    Done,
    /// A pipeline step failed; see the session error.
    Failed,
    /// The user cancelled during download.
    Cancelled,
}

impl UpdatePhase {
    /// `true` while a check or install is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Checking
                | Self::Downloading
                | Self::Mounting
                | Self::Installing
                | Self::Relaunching
        )
    }

    /// `true` for phases that end a session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::UpToDate | Self::CheckFailed | Self::Done | Self::Failed | Self::Cancelled
        )
    }
}

/// The one mutable entity owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    /// Current pipeline phase.
    pub phase: UpdatePhase,
    /// Download progress in `[0, 1]`.
    pub progress: f32,
    /// Human-readable failure reason, set alongside `Failed` and
    /// `CheckFailed`.
    pub error: Option<String>,
    /// Latest fetched release, kept while it is actionable.
    pub release: Option<ReleaseInfo>,
    /// Local artifact path, set once the download lands.
    pub artifact_path: Option<PathBuf>,
    /// Mount point, set after attach and cleared after detach.
    pub mount_point: Option<PathBuf>,
    /// Cancellation token for the in-flight transfer.
    pub cancel: CancelToken,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self {
            phase: UpdatePhase::Idle,
            progress: 0.0,
            error: None,
            release: None,
            artifact_path: None,
            mount_point: None,
            cancel: CancelToken::new(),
        }
    }
}

impl UpdateSession {
    /// Accept a new check request, resetting any terminal leftovers.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Busy`] if a session is already in flight.
    pub fn begin_check(&mut self) -> Result<(), UpdateError> {
        if self.phase.is_busy() {
            return Err(UpdateError::Busy);
        }
        *self = Self::default();
        self.phase = UpdatePhase::Checking;
        Ok(())
    }

    /// Accept an install request for the held release.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Busy`] if a session is in flight,
    /// [`UpdateError::NothingToInstall`] if no installable release is on
    /// hand.
    pub fn begin_install(&mut self) -> Result<ReleaseInfo, UpdateError> {
        if self.phase.is_busy() {
            return Err(UpdateError::Busy);
        }
        let installable = self
            .release
            .as_ref()
            .is_some_and(ReleaseInfo::is_installable);
        if self.phase != UpdatePhase::UpdateAvailable || !installable {
            return Err(UpdateError::NothingToInstall);
        }

        self.progress = 0.0;
        self.error = None;
        self.artifact_path = None;
        self.mount_point = None;
        self.cancel = CancelToken::new();
        self.phase = UpdatePhase::Downloading;

        // Guarded by is_installable above.
        self.release
            .clone()
            .ok_or(UpdateError::NothingToInstall)
    }

    /// Record a terminal failure.
    pub fn fail(&mut self, phase_before: UpdatePhase, error: &UpdateError) {
        tracing::debug!(?phase_before, %error, "session failed");
        self.phase = if phase_before == UpdatePhase::Checking {
            UpdatePhase::CheckFailed
        } else {
            UpdatePhase::Failed
        };
        self.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::version::VersionNumber;

    fn installable_release() -> ReleaseInfo {
        ReleaseInfo {
            version: VersionNumber::parse("2.3.0"),
            tag: "v2.3.0".to_owned(),
            notes: String::new(),
            artifact_url: Some("https://example.com/fsocial-2.3.0.dmg".to_owned()),
            artifact_name: Some("fsocial-2.3.0.dmg".to_owned()),
        }
    }

    #[test]
    fn check_rejected_while_busy() {
        let mut session = UpdateSession::default();
        session.begin_check().unwrap();
        assert_eq!(session.phase, UpdatePhase::Checking);
        assert!(matches!(session.begin_check(), Err(UpdateError::Busy)));
    }

    #[test]
    fn install_rejected_while_downloading() {
        let mut session = UpdateSession::default();
        session.phase = UpdatePhase::UpdateAvailable;
        session.release = Some(installable_release());
        session.begin_install().unwrap();
        assert_eq!(session.phase, UpdatePhase::Downloading);

        // A second install must not disturb the in-flight session.
        assert!(matches!(session.begin_install(), Err(UpdateError::Busy)));
        assert_eq!(session.phase, UpdatePhase::Downloading);
    }

    #[test]
    fn install_requires_an_installable_release() {
        let mut session = UpdateSession::default();
        assert!(matches!(
            session.begin_install(),
            Err(UpdateError::NothingToInstall)
        ));

        // Informational-only release (no artifact) is not installable.
        session.phase = UpdatePhase::UpdateAvailable;
        session.release = Some(ReleaseInfo {
            artifact_url: None,
            artifact_name: None,
            ..installable_release()
        });
        assert!(matches!(
            session.begin_install(),
            Err(UpdateError::NothingToInstall)
        ));
    }

    #[test]
    fn new_check_resets_terminal_state() {
        let mut session = UpdateSession::default();
        session.phase = UpdatePhase::Failed;
        session.error = Some("mount failed".to_owned());
        session.progress = 0.4;

        session.begin_check().unwrap();
        assert_eq!(session.phase, UpdatePhase::Checking);
        assert!(session.error.is_none());
        assert_eq!(session.progress, 0.0);
    }

    #[test]
    fn check_failure_maps_to_check_failed() {
        let mut session = UpdateSession::default();
        session.begin_check().unwrap();
        session.fail(
            UpdatePhase::Checking,
            &UpdateError::Fetch("timed out".to_owned()),
        );
        assert_eq!(session.phase, UpdatePhase::CheckFailed);
        assert!(session.error.as_deref().unwrap().contains("timed out"));
    }

    #[test]
    fn pipeline_failure_maps_to_failed() {
        let mut session = UpdateSession::default();
        session.fail(
            UpdatePhase::Mounting,
            &UpdateError::Mount("attach failed".to_owned()),
        );
        assert_eq!(session.phase, UpdatePhase::Failed);
    }

    #[test]
    fn busy_and_terminal_phases_are_disjoint() {
        let all = [
            UpdatePhase::Idle,
            UpdatePhase::Checking,
            UpdatePhase::UpdateAvailable,
            UpdatePhase::UpToDate,
            UpdatePhase::CheckFailed,
            UpdatePhase::Downloading,
            UpdatePhase::Mounting,
            UpdatePhase::Installing,
            UpdatePhase::Relaunching,
            UpdatePhase::Done,
            UpdatePhase::Failed,
            UpdatePhase::Cancelled,
        ];
        for phase in all {
            assert!(!(phase.is_busy() && phase.is_terminal()), "{phase:?}");
        }
    }
}
