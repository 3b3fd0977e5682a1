//! Command-line harness for the update pipeline.
//!
//! `updaterctl check` prints whether a newer release exists;
//! `updaterctl install` runs the full pipeline. Intended for development
//! and scripting; the app itself drives the orchestrator directly.

use fsocial_updater::tools::{CommandRunner, ToolRunner};
use fsocial_updater::{UpdateEvent, UpdateOrchestrator, UpdatePhase, UpdaterConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let command = std::env::args().nth(1).unwrap_or_default();
    let result = match command.as_str() {
        "check" => run_check(),
        "install" => run_install(),
        _ => {
            eprintln!("usage: updaterctl <check|install>");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("updaterctl failed: {e}");
        std::process::exit(1);
    }
}

fn load_config() -> UpdaterConfig {
    let path = dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fsocial")
        .join("updater.toml");
    UpdaterConfig::load_or_default(&path)
}

fn run_check() -> fsocial_updater::Result<()> {
    let (orchestrator, events) = UpdateOrchestrator::new(load_config());
    orchestrator.request_check()?;
    orchestrator.join_worker();

    for event in events.try_iter() {
        match event {
            UpdateEvent::UpdateAvailable {
                release,
                releases_page,
            } => {
                println!("update available: {} ({})", release.version, release.tag);
                if !release.notes.is_empty() {
                    println!("\n{}", release.notes);
                }
                if !release.is_installable() {
                    println!(
                        "(no installable artifact published for this platform; \
                         download from {releases_page})"
                    );
                }
            }
            UpdateEvent::UpToDate { current } => {
                println!("up to date ({current})");
            }
            UpdateEvent::CheckFailed { message } => {
                println!("check failed: {message}");
            }
            _ => {}
        }
    }
    Ok(())
}

fn run_install() -> fsocial_updater::Result<()> {
    let config = load_config();
    let releases_page = config.releases_page_url();
    let (orchestrator, events) = UpdateOrchestrator::new(config);
    orchestrator.request_check()?;
    orchestrator.join_worker();

    // An up-to-date check also records the release it saw, so the phase
    // is what decides whether there is anything to install.
    let snapshot = orchestrator.snapshot();
    if snapshot.phase != UpdatePhase::UpdateAvailable {
        println!("nothing to install");
        return Ok(());
    }
    let Some(release) = snapshot.release.filter(|r| r.is_installable()) else {
        println!("no installable artifact published for this platform; opening {releases_page}");
        open_page(&releases_page);
        return Ok(());
    };
    println!("installing {} ...", release.version);

    // Drop the buffered check-phase events so the install report starts
    // at Downloading.
    for _ in events.try_iter() {}

    orchestrator.request_install()?;
    for event in events.iter() {
        match event {
            UpdateEvent::DownloadProgress { fraction } => {
                print!("\rdownloading... {:3.0}%", fraction * 100.0);
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }
            UpdateEvent::PhaseChanged { phase } => {
                println!("\n{phase:?}");
            }
            UpdateEvent::Failed {
                message,
                manual_artifact,
            } => {
                println!("\nfailed: {message}");
                if let Some(path) = manual_artifact {
                    println!("artifact kept at {} for manual install", path.display());
                }
                break;
            }
            UpdateEvent::Cancelled => {
                println!("\ncancelled");
                break;
            }
            UpdateEvent::Done => {
                println!("\ninstalled; relaunching");
                break;
            }
            _ => {}
        }
    }
    orchestrator.join_worker();
    Ok(())
}

fn open_page(url: &str) {
    match CommandRunner.run("open", &[url]) {
        Ok(output) if output.success() => {}
        Ok(output) => eprintln!("cannot open {url}: {}", output.stderr_brief()),
        Err(e) => eprintln!("cannot open {url}: {e}"),
    }
}
