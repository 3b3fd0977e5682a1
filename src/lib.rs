//! fsocial self-update pipeline.
//!
//! Checks the GitHub release feed for a newer build, downloads the
//! matching disk image, mounts it, atomically replaces the installed
//! app bundle (escalating privileges when the install location is not
//! writable), and hands off execution to the new version.
//!
//! # Architecture
//!
//! The pipeline is a strict sequence of stages owned by one
//! [`UpdateOrchestrator`]:
//! Check → Download → Mount → Locate → Install → Relaunch
//!
//! All I/O and subprocess work runs on a background worker thread; the
//! UI observes a session snapshot and an event channel. External tools
//! (`hdiutil`, `ditto`, `xattr`, `osascript`, `open`) sit behind the
//! [`tools::ToolRunner`] trait so the whole pipeline is testable without
//! spawning real subprocesses.

pub mod config;
pub mod download;
pub mod error;
pub mod feed;
pub mod install;
pub mod locate;
pub mod mount;
pub mod orchestrator;
pub mod relaunch;
pub mod session;
pub mod test_utils;
pub mod tools;
pub mod version;

pub use config::UpdaterConfig;
pub use download::{ArtifactDownloader, CancelToken};
pub use error::{Result, UpdateError};
pub use feed::{ReleaseFetcher, ReleaseInfo};
pub use orchestrator::{UpdateEvent, UpdateOrchestrator};
pub use session::{UpdatePhase, UpdateSession};
pub use version::VersionNumber;
