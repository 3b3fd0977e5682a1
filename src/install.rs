//! Replaces the installed app bundle with the newly mounted copy.
//!
//! The direct path runs in-process file operations plus `ditto`/`xattr`
//! subprocesses. If the install location is not writable, or the direct
//! path fails on a permission error, the whole remove+copy+strip
//! sequence is retried exactly once through a single privilege-escalated
//! `osascript` invocation.
//!
//! The replace is remove-then-copy, not stage-then-rename: a failure
//! between the two sub-steps can leave the destination partially
//! replaced. Callers must not assume the destination is consistent after
//! a failed install.

use crate::error::{Result, UpdateError};
use crate::tools::ToolRunner;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const QUARANTINE_ATTR: &str = "com.apple.quarantine";

/// How the direct (non-escalated) path failed.
enum DirectFailure {
    /// Permission-class failure; eligible for the escalated retry.
    Permission(String),
    /// Any other failure; terminal for this attempt.
    Other(String),
}

/// Installs a new app bundle over the existing one.
pub struct Installer {
    runner: Arc<dyn ToolRunner>,
    trash_dir: PathBuf,
}

impl Installer {
    /// Build an installer that retires replaced bundles into the user's
    /// trash directory.
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        let trash_dir = dirs::home_dir()
            .map(|home| home.join(".Trash"))
            .unwrap_or_else(std::env::temp_dir);
        Self { runner, trash_dir }
    }

    /// Override the trash directory (tests).
    pub fn with_trash_dir(mut self, trash_dir: PathBuf) -> Self {
        self.trash_dir = trash_dir;
        self
    }

    /// Replace the bundle at `dest` with `source`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Install`] when both the direct and the
    /// escalated paths fail, or when the direct path fails for a
    /// non-permission reason. The destination may be left partially
    /// replaced.
    pub fn install(&self, source: &Path, dest: &Path) -> Result<()> {
        let writable = match dest.parent() {
            Some(parent) => destination_writable(parent)?,
            None => false,
        };

        if writable {
            match self.direct_install(source, dest) {
                Ok(()) => return Ok(()),
                Err(DirectFailure::Permission(msg)) => {
                    tracing::info!(%msg, "direct install hit a permission error, escalating");
                }
                Err(DirectFailure::Other(msg)) => {
                    return Err(UpdateError::Install(msg));
                }
            }
        } else {
            tracing::info!(dest = %dest.display(), "install location not writable, escalating");
        }

        self.escalated_install(source, dest)
    }

    /// In-process remove+copy+strip.
    fn direct_install(&self, source: &Path, dest: &Path) -> std::result::Result<(), DirectFailure> {
        if dest.exists() {
            self.retire_existing(dest)?;
        }
        self.copy_bundle(source, dest)?;
        self.strip_quarantine(dest);
        tracing::info!(dest = %dest.display(), "installed new bundle");
        Ok(())
    }

    /// Move the old bundle into the trash so the replace is recoverable.
    /// Falls back to outright deletion if the rename fails (for example
    /// across volumes).
    fn retire_existing(&self, dest: &Path) -> std::result::Result<(), DirectFailure> {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_owned());
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let retired = self.trash_dir.join(format!("{name}.{epoch}"));

        match std::fs::rename(dest, &retired) {
            Ok(()) => {
                tracing::info!(from = %dest.display(), to = %retired.display(), "moved old bundle to trash");
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(DirectFailure::Permission(format!(
                    "cannot move old bundle to trash: {e}"
                )));
            }
            Err(e) => {
                tracing::warn!(error = %e, "trash move failed, deleting old bundle instead");
            }
        }

        let dest_arg = dest.to_string_lossy().into_owned();
        let output = self
            .runner
            .run("rm", &["-rf", &dest_arg])
            .map_err(|e| classify_spawn("rm", &e))?;
        if !output.success() {
            return Err(classify_tool("cannot remove old bundle", output.stderr_brief()));
        }
        Ok(())
    }

    /// Copy the bundle with `ditto`, which preserves bundle structure,
    /// resource forks, and permissions.
    fn copy_bundle(&self, source: &Path, dest: &Path) -> std::result::Result<(), DirectFailure> {
        let source_arg = source.to_string_lossy().into_owned();
        let dest_arg = dest.to_string_lossy().into_owned();
        let output = self
            .runner
            .run("ditto", &[&source_arg, &dest_arg])
            .map_err(|e| classify_spawn("ditto", &e))?;
        if !output.success() {
            return Err(classify_tool("cannot copy new bundle", output.stderr_brief()));
        }
        Ok(())
    }

    /// Strip the download-provenance marker so the new bundle launches
    /// without a Gatekeeper prompt. Best-effort: a failed strip is
    /// logged, not fatal.
    fn strip_quarantine(&self, dest: &Path) {
        let dest_arg = dest.to_string_lossy().into_owned();
        match self
            .runner
            .run("xattr", &["-dr", QUARANTINE_ATTR, &dest_arg])
        {
            Ok(output) if output.success() => {}
            Ok(output) => {
                tracing::warn!(stderr = %output.stderr_brief(), "quarantine strip failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot run xattr");
            }
        }
    }

    /// One privilege-escalated invocation that redoes remove+copy+strip
    /// as a single shell command. Failure here is terminal.
    fn escalated_install(&self, source: &Path, dest: &Path) -> Result<()> {
        let script = format!(
            "do shell script \"rm -rf {dest} && ditto {source} {dest} && xattr -dr {attr} {dest}\" \
             with administrator privileges",
            source = quoted(source),
            dest = quoted(dest),
            attr = QUARANTINE_ATTR,
        );

        tracing::info!(dest = %dest.display(), "running escalated install");
        let output = self
            .runner
            .run("osascript", &["-e", &script])
            .map_err(|e| UpdateError::Install(format!("cannot run osascript: {e}")))?;

        if !output.success() {
            // Covers both a failed replace and the user declining the
            // authorization prompt.
            return Err(UpdateError::Install(format!(
                "escalated install failed: {}",
                output.stderr_brief()
            )));
        }
        tracing::info!(dest = %dest.display(), "escalated install succeeded");
        Ok(())
    }
}

/// Probe whether the current process can create entries in `dir`.
fn destination_writable(dir: &Path) -> Result<bool> {
    let probe = dir.join(format!(".fsocial-updater-probe.{}", std::process::id()));
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Ok(false),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(UpdateError::Io(e)),
    }
}

/// Shell-quote a path for embedding inside the osascript shell string.
fn quoted(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

fn classify_spawn(program: &str, e: &std::io::Error) -> DirectFailure {
    if e.kind() == ErrorKind::PermissionDenied {
        DirectFailure::Permission(format!("cannot run {program}: {e}"))
    } else {
        DirectFailure::Other(format!("cannot run {program}: {e}"))
    }
}

fn classify_tool(context: &str, stderr: &str) -> DirectFailure {
    let lowered = stderr.to_lowercase();
    if lowered.contains("permission denied") || lowered.contains("operation not permitted") {
        DirectFailure::Permission(format!("{context}: {stderr}"))
    } else {
        DirectFailure::Other(format!("{context}: {stderr}"))
    }
}
