//! Running application lookup and lifecycle via NSWorkspace and `open`

use crate::backend::AppInfo;
use crate::error::{Error, Result};
use anyhow::Context;
use cidre::ns;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const LAUNCH_POLL: Duration = Duration::from_millis(500);
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Regular (dock-visible) apps, sorted by name.
pub fn running_apps() -> Vec<AppInfo> {
    let workspace = ns::Workspace::shared();
    let mut apps: Vec<AppInfo> = workspace
        .running_apps()
        .iter()
        .filter(|app| app.activation_policy() == ns::AppActivationPolicy::Regular)
        .filter_map(|app| {
            let name = app.localized_name()?.to_string();
            Some(AppInfo {
                name,
                pid: app.pid(),
                bundle_id: app.bundle_id().map(|b| b.to_string()),
            })
        })
        .collect();
    apps.sort_by(|a, b| a.name.cmp(&b.name));
    apps
}

pub fn find_running(identifier: &str) -> Option<AppInfo> {
    let name = display_name(identifier);
    running_apps()
        .into_iter()
        .find(|app| app.matches_identifier(identifier) || app.name == name)
}

/// `/Applications/Notes.app` -> `Notes`; anything else passes through.
fn display_name(identifier: &str) -> &str {
    if identifier.ends_with(".app") || identifier.contains('/') {
        Path::new(identifier)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(identifier)
    } else {
        identifier
    }
}

fn is_bundle_id(identifier: &str) -> bool {
    identifier.contains('.') && !identifier.contains('/') && !identifier.ends_with(".app")
}

pub fn launch(identifier: &str, args: &[String]) -> Result<AppInfo> {
    let mut cmd = Command::new("open");
    if is_bundle_id(identifier) {
        cmd.arg("-b").arg(identifier);
    } else if identifier.contains('/') {
        cmd.arg(identifier);
    } else {
        cmd.arg("-a").arg(identifier);
    }
    if !args.is_empty() {
        cmd.arg("--args").args(args);
    }

    let output = cmd.output().context("Failed to run open")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(identifier, stderr = %stderr.trim(), "open failed");
        return Err(Error::application_not_found(identifier));
    }
    wait_and_attach(identifier)
}

fn wait_and_attach(identifier: &str) -> Result<AppInfo> {
    let deadline = Instant::now() + LAUNCH_TIMEOUT;
    loop {
        if let Some(app) = find_running(identifier) {
            return Ok(app);
        }
        if Instant::now() >= deadline {
            return Err(Error::timeout(&format!("launch of {}", identifier), LAUNCH_TIMEOUT.as_secs_f64()));
        }
        thread::sleep(LAUNCH_POLL);
    }
}

fn alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

pub fn terminate(app: &AppInfo) -> Result<()> {
    if !alive(app.pid) {
        return Err(Error::application_not_found(&app.name));
    }
    unsafe {
        libc::kill(app.pid, libc::SIGTERM);
    }
    let deadline = Instant::now() + TERMINATE_TIMEOUT;
    while alive(app.pid) {
        if Instant::now() >= deadline {
            tracing::warn!(app = %app.name, pid = app.pid, "app did not exit after SIGTERM");
            return Err(Error::timeout(&format!("terminate {}", app.name), TERMINATE_TIMEOUT.as_secs_f64()));
        }
        thread::sleep(Duration::from_millis(100));
    }
    Ok(())
}
