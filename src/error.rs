//! Error types for the update pipeline.

/// Top-level error type for the self-update system.
///
/// Each variant maps to one pipeline stage so the UI can distinguish,
/// for example, a failed download from a disk image that mounted fine
/// but did not contain the expected app bundle.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Release feed request or payload parse error.
    #[error("release check failed: {0}")]
    Fetch(String),

    /// Artifact download error (network or local write).
    #[error("download failed: {0}")]
    Download(String),

    /// The in-flight download was cancelled by the user.
    #[error("download cancelled")]
    Cancelled,

    /// Disk image attach/detach error.
    #[error("disk image error: {0}")]
    Mount(String),

    /// The mounted image did not contain the expected app bundle.
    #[error("bundle not found: {0}")]
    Locate(String),

    /// Replacing the installed app failed, even after escalation.
    #[error("install failed: {0}")]
    Install(String),

    /// The newly installed app could not be launched.
    #[error("relaunch failed: {0}")]
    Launch(String),

    /// An update session is already in flight; the request was rejected.
    #[error("an update operation is already in progress")]
    Busy,

    /// Install was requested without an installable release on hand.
    #[error("no installable update available")]
    NothingToInstall,

    /// Configuration load/save error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
