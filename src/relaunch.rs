//! Launches the newly installed app and schedules the handoff.
//!
//! The old process must never terminate unless the new instance launched
//! successfully, so the user is never left with neither instance running.
//! Termination itself is behind an injectable hook so tests can assert it
//! is (or is not) armed without exiting the test harness.

use crate::error::{Result, UpdateError};
use crate::tools::ToolRunner;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Hook invoked to end the current process after the handoff delay.
pub type Terminator = Arc<dyn Fn(Duration) + Send + Sync>;

/// The real terminator: sleep out the handoff delay, then exit.
pub fn exit_terminator() -> Terminator {
    Arc::new(|delay: Duration| {
        tracing::info!(?delay, "handing off to the new instance");
        std::thread::sleep(delay);
        std::process::exit(0);
    })
}

/// Starts the newly installed app bundle.
pub struct Relauncher {
    runner: Arc<dyn ToolRunner>,
}

impl Relauncher {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Launch a new instance of `bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Launch`] if the launcher cannot be spawned
    /// or reports failure. On error the caller must leave the current
    /// process running.
    pub fn relaunch(&self, bundle: &Path) -> Result<()> {
        let bundle_arg = bundle.to_string_lossy().into_owned();
        tracing::info!(bundle = %bundle.display(), "launching new instance");

        let output = self
            .runner
            .run("open", &["-n", &bundle_arg])
            .map_err(|e| UpdateError::Launch(format!("cannot run open: {e}")))?;

        if !output.success() {
            return Err(UpdateError::Launch(format!(
                "open failed: {}",
                output.stderr_brief()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::test_utils::RecordingRunner;

    #[test]
    fn relaunch_opens_a_new_instance() {
        let runner = Arc::new(RecordingRunner::new());
        let relauncher = Relauncher::new(runner.clone());
        relauncher
            .relaunch(Path::new("/Applications/fsocial.app"))
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "open");
        assert_eq!(calls[0].1, vec!["-n", "/Applications/fsocial.app"]);
    }

    #[test]
    fn failed_launch_is_reported() {
        let runner = Arc::new(
            RecordingRunner::new().failing("open", "The application cannot be opened"),
        );
        let relauncher = Relauncher::new(runner);
        let err = relauncher
            .relaunch(Path::new("/Applications/fsocial.app"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Launch(_)));
    }
}
