//! Release feed contract tests.
//!
//! Verify the exact HTTP shape of the release check (endpoint, Accept
//! header) and how feed payloads map onto check outcomes, against a mock
//! GitHub API.

use fsocial_updater::relaunch::Terminator;
use fsocial_updater::test_utils::RecordingRunner;
use fsocial_updater::{
    UpdateError, UpdateEvent, UpdateOrchestrator, UpdatePhase, UpdaterConfig, VersionNumber,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer, current_version: &str) -> UpdaterConfig {
    let mut config = UpdaterConfig::default();
    config.api_base = server.uri();
    config.current_version = current_version.to_owned();
    config
}

fn noop_terminator() -> Terminator {
    Arc::new(|_| {})
}

fn orchestrator(
    config: UpdaterConfig,
) -> (UpdateOrchestrator, crossbeam_channel::Receiver<UpdateEvent>) {
    UpdateOrchestrator::with_parts(config, Arc::new(RecordingRunner::new()), noop_terminator())
}

fn release_body(tag: &str, assets: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "tag_name": tag,
        "body": "### Fixed\n- scheduler crash",
        "assets": assets,
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn newer_release_yields_update_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/buildmase/fsocial/releases/latest"))
        .and(header("Accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_body(
            "v2.3.0",
            vec![json!({
                "name": "fsocial-2.3.0.dmg",
                "browser_download_url": format!("{}/dl/fsocial-2.3.0.dmg", server.uri()),
            })],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (orchestrator, _events) = orchestrator(test_config(&server, "2.2.9"));
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();

    let session = orchestrator.snapshot();
    assert_eq!(session.phase, UpdatePhase::UpdateAvailable);

    let release = session.release.unwrap();
    assert_eq!(release.version, VersionNumber::parse("2.3.0"));
    assert_eq!(release.version.components(), &[2, 3, 0]);
    assert_eq!(release.tag, "v2.3.0");
    assert!(release.notes.contains("scheduler crash"));
    assert!(release.is_installable());
}

#[tokio::test(flavor = "multi_thread")]
async fn same_version_is_up_to_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/buildmase/fsocial/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_body(
            "v1.0.0",
            vec![json!({
                "name": "fsocial-1.0.0.dmg",
                "browser_download_url": "https://example.com/fsocial-1.0.0.dmg",
            })],
        )))
        .mount(&server)
        .await;

    let (orchestrator, _events) = orchestrator(test_config(&server, "1.0.0"));
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();

    // The seen release is recorded for display even when current, but
    // the phase says there is nothing to install and an install request
    // is refused, installable artifact or not.
    let session = orchestrator.snapshot();
    assert_eq!(session.phase, UpdatePhase::UpToDate);
    let release = session.release.unwrap();
    assert!(release.is_installable());
    assert!(matches!(
        orchestrator.request_install(),
        Err(UpdateError::NothingToInstall)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn release_without_platform_asset_is_not_installable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/buildmase/fsocial/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release_body(
            "v9.0.0",
            vec![json!({
                "name": "fsocial-9.0.0-win.zip",
                "browser_download_url": "https://example.com/fsocial.zip",
            })],
        )))
        .mount(&server)
        .await;

    let config = test_config(&server, "1.0.0");
    let releases_page = config.releases_page_url();
    let (orchestrator, events) = orchestrator(config);
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();

    // The release is reported, but only informationally.
    let session = orchestrator.snapshot();
    assert_eq!(session.phase, UpdatePhase::UpdateAvailable);
    assert!(!session.release.unwrap().is_installable());

    // Installing it is rejected.
    assert!(matches!(
        orchestrator.request_install(),
        Err(UpdateError::NothingToInstall)
    ));

    // The event hands the UI the releases page so the user still has
    // somewhere to go.
    let page = events.try_iter().find_map(|e| match e {
        UpdateEvent::UpdateAvailable { releases_page, .. } => Some(releases_page),
        _ => None,
    });
    assert_eq!(page.as_deref(), Some(releases_page.as_str()));
    assert_eq!(
        releases_page,
        "https://github.com/buildmase/fsocial/releases/latest"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_payload_is_check_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/buildmase/fsocial/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let (orchestrator, _events) = orchestrator(test_config(&server, "1.0.0"));
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();

    let session = orchestrator.snapshot();
    assert_eq!(session.phase, UpdatePhase::CheckFailed);
    assert!(session.error.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_check_failed_and_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/buildmase/fsocial/releases/latest"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (orchestrator, _events) = orchestrator(test_config(&server, "1.0.0"));
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();
    assert_eq!(orchestrator.snapshot().phase, UpdatePhase::CheckFailed);

    // A manual re-check is accepted after the failure.
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();
    assert_eq!(orchestrator.snapshot().phase, UpdatePhase::CheckFailed);
}

#[tokio::test(flavor = "multi_thread")]
async fn v_prefix_is_stripped_before_comparison() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/buildmase/fsocial/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(release_body("v1.10.0", vec![])),
        )
        .mount(&server)
        .await;

    // 1.10 is newer than 1.9 numerically, not lexicographically.
    let (orchestrator, _events) = orchestrator(test_config(&server, "1.9.0"));
    orchestrator.request_check().unwrap();
    orchestrator.join_worker();
    assert_eq!(orchestrator.snapshot().phase, UpdatePhase::UpdateAvailable);
}
