//! Release feed client.
//!
//! Queries the GitHub releases API for the latest published release,
//! parses the tag, release notes, and asset list, and selects the
//! downloadable artifact whose filename carries the platform suffix
//! (`.dmg`). A release with no matching asset is still reported, as
//! informational-only, with no artifact URL.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::version::VersionNumber;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("fsocial-updater/", env!("CARGO_PKG_VERSION"));

/// Parsed metadata for the latest published release. Immutable; a newer
/// fetch supersedes it wholesale.
#[derive(Debug, Clone)]
pub struct ReleaseInfo {
    /// Parsed version, with any leading `v` stripped from the tag.
    pub version: VersionNumber,
    /// Raw tag name as published (`v2.3.0`).
    pub tag: String,
    /// Human-readable changelog body.
    pub notes: String,
    /// Download URL of the installable artifact, if one matched the
    /// platform suffix.
    pub artifact_url: Option<String>,
    /// Filename of the matched artifact.
    pub artifact_name: Option<String>,
}

impl ReleaseInfo {
    /// `true` if the release carries an installable artifact.
    pub fn is_installable(&self) -> bool {
        self.artifact_url.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseWire {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<AssetWire>,
}

#[derive(Debug, Deserialize)]
struct AssetWire {
    name: String,
    browser_download_url: String,
}

/// Fetches and parses the latest release from the feed endpoint.
pub struct ReleaseFetcher {
    agent: ureq::Agent,
    url: String,
    asset_suffix: String,
}

impl ReleaseFetcher {
    /// Build a fetcher from the updater configuration.
    pub fn new(config: &UpdaterConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(30))
            .build();
        Self {
            agent,
            url: config.latest_release_url(),
            asset_suffix: config.asset_suffix.clone(),
        }
    }

    /// Fetch the latest release. One request, no automatic retry; the
    /// caller may re-invoke manually.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Fetch`] on network failure, a non-success
    /// status, or a malformed payload.
    pub fn fetch_latest(&self) -> Result<ReleaseInfo> {
        tracing::debug!(url = %self.url, "checking release feed");
        let resp = self
            .agent
            .get(&self.url)
            .set("Accept", "application/vnd.github.v3+json")
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| UpdateError::Fetch(e.to_string()))?;

        let body = resp
            .into_string()
            .map_err(|e| UpdateError::Fetch(format!("cannot read feed response: {e}")))?;
        let wire: ReleaseWire = serde_json::from_str(&body)
            .map_err(|e| UpdateError::Fetch(format!("malformed release feed: {e}")))?;

        let release = parse_release(wire, &self.asset_suffix);
        tracing::info!(
            tag = %release.tag,
            installable = release.is_installable(),
            "release feed parsed"
        );
        Ok(release)
    }
}

/// Turn the wire document into a [`ReleaseInfo`], selecting the first
/// asset whose name ends with `suffix`.
fn parse_release(wire: ReleaseWire, suffix: &str) -> ReleaseInfo {
    let artifact = wire
        .assets
        .into_iter()
        .find(|asset| asset.name.ends_with(suffix));
    let (artifact_url, artifact_name) = match artifact {
        Some(asset) => (Some(asset.browser_download_url), Some(asset.name)),
        None => (None, None),
    };

    let cleaned = wire.tag_name.trim_start_matches('v');
    ReleaseInfo {
        version: VersionNumber::parse(cleaned),
        tag: wire.tag_name.clone(),
        notes: wire.body.unwrap_or_default(),
        artifact_url,
        artifact_name,
    }
}
