//! Updater configuration.
//!
//! All knobs the pipeline needs: which GitHub repo to watch, which asset
//! suffix identifies the installable artifact, and the fixed filesystem
//! locations for the download, the mount point, and the installed app.
//! Persisted as TOML; every field has a default so a missing or partial
//! file still yields a working configuration.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the self-update pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// GitHub repository in `owner/name` form.
    pub repo: String,
    /// Base URL of the release feed API. Overridable so tests can point
    /// the fetcher at a local mock server.
    pub api_base: String,
    /// Asset filename suffix that identifies the installable artifact
    /// for this platform.
    pub asset_suffix: String,
    /// Name of the app bundle inside the disk image and at the install
    /// location.
    pub bundle_name: String,
    /// Directory holding the installed app bundle.
    pub install_dir: PathBuf,
    /// Directory the downloaded artifact is moved into once complete.
    pub download_dir: PathBuf,
    /// Fixed, namespaced mount point for the disk image. Namespacing the
    /// path keeps concurrent unrelated mounts from colliding.
    pub mount_point: PathBuf,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds (downloads can be slow).
    pub read_timeout_secs: u64,
    /// Delay between launching the new app and terminating this process,
    /// so the user is never left with neither instance running.
    pub handoff_delay_ms: u64,
    /// Version string of the running app. Hosts embedding the updater
    /// supply their packaging version here.
    pub current_version: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            repo: "buildmase/fsocial".to_owned(),
            api_base: "https://api.github.com".to_owned(),
            asset_suffix: ".dmg".to_owned(),
            bundle_name: "fsocial.app".to_owned(),
            install_dir: PathBuf::from("/Applications"),
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| std::env::temp_dir().join("fsocial-updater")),
            mount_point: PathBuf::from("/Volumes/fsocial-update"),
            connect_timeout_secs: 15,
            read_timeout_secs: 300,
            handoff_delay_ms: 1500,
            current_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a TOML file. Returns the default
    /// configuration if the file is missing or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&text).unwrap_or_default()
    }

    /// Persist the configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| UpdateError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// URL of the latest-release feed document.
    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, self.repo)
    }

    /// Human-browsable releases page, used as a last-resort manual
    /// fallback when no artifact is on disk.
    pub fn releases_page_url(&self) -> String {
        format!("https://github.com/{}/releases/latest", self.repo)
    }

    /// Full path of the installed app bundle.
    pub fn installed_bundle_path(&self) -> PathBuf {
        self.install_dir.join(&self.bundle_name)
    }

    /// Handoff delay as a [`Duration`].
    pub fn handoff_delay(&self) -> Duration {
        Duration::from_millis(self.handoff_delay_ms)
    }
}
