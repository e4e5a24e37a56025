//! Target application lifecycle
//!
//! `AppManager` holds at most one "current application". Connecting to
//! anything new replaces it; disconnecting forgets it without touching the
//! process.

use crate::backend::{AppInfo, PlatformBackend};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How to find or start the application under test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetApp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launch_args: Vec<String>,
}

impl TargetApp {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn bundle(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: Some(bundle_id.into()),
            ..Self::default()
        }
    }

    /// bundle id, then path, then name.
    pub fn launch_identifier(&self) -> Option<&str> {
        self.bundle_id
            .as_deref()
            .or(self.path.as_deref())
            .or(self.name.as_deref())
    }

    /// bundle id, then name, then path.
    pub fn attach_identifier(&self) -> Option<&str> {
        self.bundle_id
            .as_deref()
            .or(self.name.as_deref())
            .or(self.path.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.launch_identifier().is_none()
    }
}

#[derive(Debug, Default)]
pub struct AppManager {
    current: Option<AppInfo>,
}

impl AppManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&AppInfo> {
        self.current.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    pub fn launch<B>(&mut self, backend: &B, target: &TargetApp) -> Result<AppInfo>
    where
        B: PlatformBackend + ?Sized,
    {
        let app = launch(backend, target)?;
        self.connect(app.clone());
        Ok(app)
    }

    pub fn attach<B>(&mut self, backend: &B, identifier: &str) -> Result<AppInfo>
    where
        B: PlatformBackend + ?Sized,
    {
        let app = attach(backend, identifier)?;
        self.connect(app.clone());
        Ok(app)
    }

    pub fn launch_or_attach<B>(&mut self, backend: &B, target: &TargetApp) -> Result<AppInfo>
    where
        B: PlatformBackend + ?Sized,
    {
        let app = launch_or_attach(backend, target)?;
        self.connect(app.clone());
        Ok(app)
    }

    pub fn connect(&mut self, app: AppInfo) {
        if let Some(previous) = self.current.replace(app) {
            tracing::debug!(app = %previous.name, "dropped previous application reference");
        }
    }

    pub fn disconnect(&mut self) -> Option<AppInfo> {
        self.current.take()
    }
}

// The native calls below don't touch an `AppManager`, so callers holding one
// behind a lock can run them unlocked and `connect` the result afterwards.

pub fn launch<B>(backend: &B, target: &TargetApp) -> Result<AppInfo>
where
    B: PlatformBackend + ?Sized,
{
    let identifier = target.launch_identifier().ok_or_else(|| {
        Error::application_not_found("<none>").with_suggestions(vec![
            "Set bundle_id, path or name on the target app".to_string(),
        ])
    })?;
    let app = backend.launch_application(identifier, &target.launch_args)?;
    tracing::info!(app = %app.name, pid = app.pid, "launched application");
    Ok(app)
}

pub fn attach<B>(backend: &B, identifier: &str) -> Result<AppInfo>
where
    B: PlatformBackend + ?Sized,
{
    let app = backend.attach_to_application(identifier)?;
    tracing::info!(app = %app.name, pid = app.pid, "attached to application");
    Ok(app)
}

/// Attach when the app is already running, launch otherwise.
pub fn launch_or_attach<B>(backend: &B, target: &TargetApp) -> Result<AppInfo>
where
    B: PlatformBackend + ?Sized,
{
    if let Some(identifier) = target.attach_identifier() {
        match attach(backend, identifier) {
            Ok(app) => return Ok(app),
            Err(e) => tracing::debug!(error = %e, identifier, "attach failed, launching"),
        }
    }
    launch(backend, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::virtual_desktop::{VirtualApp, VirtualDesktop};

    #[test]
    fn identifier_priorities() {
        let target = TargetApp {
            path: Some("/Applications/Notes.app".to_string()),
            bundle_id: None,
            name: Some("Notes".to_string()),
            launch_args: vec![],
        };
        assert_eq!(target.launch_identifier(), Some("/Applications/Notes.app"));
        assert_eq!(target.attach_identifier(), Some("Notes"));
        assert!(TargetApp::default().is_empty());
    }

    #[test]
    fn launch_requires_identifier() {
        let desktop = VirtualDesktop::new();
        let mut apps = AppManager::new();
        let err = apps.launch(&desktop, &TargetApp::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApplicationNotFound);
        assert!(!apps.is_connected());
    }

    #[test]
    fn launch_or_attach_prefers_running_app() {
        let desktop = VirtualDesktop::new();
        desktop.install(VirtualApp::new("Notes"));
        let running = desktop.spawn(VirtualApp::new("Notes"));
        let mut apps = AppManager::new();

        let app = apps.launch_or_attach(&desktop, &TargetApp::named("Notes")).unwrap();
        assert_eq!(app, running);
        assert_eq!(desktop.list_running_applications().unwrap().len(), 1);
    }

    #[test]
    fn launch_or_attach_launches_when_absent() {
        let desktop = VirtualDesktop::new();
        desktop.install(VirtualApp::new("Notes"));
        let mut apps = AppManager::new();

        let app = apps.launch_or_attach(&desktop, &TargetApp::named("Notes")).unwrap();
        assert_eq!(apps.current(), Some(&app));
        assert!(desktop.is_running("Notes"));
    }

    #[test]
    fn connecting_supersedes_previous_reference() {
        let desktop = VirtualDesktop::new();
        let a = desktop.spawn(VirtualApp::new("A"));
        let b = desktop.spawn(VirtualApp::new("B"));
        let mut apps = AppManager::new();
        apps.attach(&desktop, "A").unwrap();
        apps.attach(&desktop, &b.pid.to_string()).unwrap();
        assert_eq!(apps.current(), Some(&b));
        assert_eq!(apps.disconnect(), Some(b));
        assert!(!apps.is_connected());
        assert!(desktop.is_running(&a.name));
    }
}
