//! Disk image mounting.
//!
//! Attaches the downloaded `.dmg` at a fixed, namespaced mount point via
//! `hdiutil` so concurrent unrelated mounts never collide. Detach is
//! idempotent: every failure path after a successful attach detaches
//! before surfacing, and a second detach must not mask the original
//! error.

use crate::error::{Result, UpdateError};
use crate::tools::ToolRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle to an attached disk image.
#[derive(Debug)]
pub struct MountHandle {
    mount_point: PathBuf,
    attached: bool,
}

impl MountHandle {
    /// Filesystem root of the mounted image contents.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// `true` while the image is attached.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// Attaches and detaches release disk images.
pub struct DmgMounter {
    runner: Arc<dyn ToolRunner>,
    mount_point: PathBuf,
}

impl DmgMounter {
    /// Build a mounter that attaches at `mount_point`.
    pub fn new(runner: Arc<dyn ToolRunner>, mount_point: PathBuf) -> Self {
        Self {
            runner,
            mount_point,
        }
    }

    /// Attach `artifact` at the fixed mount point.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Mount`] if `hdiutil attach` cannot be
    /// spawned or exits non-zero.
    pub fn mount(&self, artifact: &Path) -> Result<MountHandle> {
        let mount_point = self.mount_point.to_string_lossy().into_owned();
        let artifact_arg = artifact.to_string_lossy().into_owned();

        tracing::info!(image = %artifact.display(), at = %self.mount_point.display(), "attaching disk image");
        let output = self
            .runner
            .run(
                "hdiutil",
                &[
                    "attach",
                    "-nobrowse",
                    "-noautoopen",
                    "-mountpoint",
                    &mount_point,
                    &artifact_arg,
                ],
            )
            .map_err(|e| UpdateError::Mount(format!("cannot run hdiutil: {e}")))?;

        if !output.success() {
            return Err(UpdateError::Mount(format!(
                "hdiutil attach failed: {}",
                output.stderr_brief()
            )));
        }

        Ok(MountHandle {
            mount_point: self.mount_point.clone(),
            attached: true,
        })
    }

    /// Detach the image behind `handle`. Idempotent: detaching an
    /// already-detached handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Mount`] if a live detach cannot be spawned
    /// or exits non-zero.
    pub fn unmount(&self, handle: &mut MountHandle) -> Result<()> {
        if !handle.attached {
            return Ok(());
        }

        let mount_point = handle.mount_point.to_string_lossy().into_owned();
        tracing::info!(at = %handle.mount_point.display(), "detaching disk image");
        let output = self
            .runner
            .run("hdiutil", &["detach", "-force", &mount_point])
            .map_err(|e| UpdateError::Mount(format!("cannot run hdiutil: {e}")))?;

        if !output.success() {
            return Err(UpdateError::Mount(format!(
                "hdiutil detach failed: {}",
                output.stderr_brief()
            )));
        }

        handle.attached = false;
        Ok(())
    }
}
