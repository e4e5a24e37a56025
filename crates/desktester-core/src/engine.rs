//! AutomationEngine - the facade recording and execution both sit on

use crate::apps::{self, AppManager, TargetApp};
use crate::backend::{AppInfo, PlatformBackend};
use crate::element::{Bounds, ElementNode, UIElement};
use crate::error::{Error, ErrorCode, Result};
use crate::locator::LocatorStrategy;
use parking_lot::Mutex;

/// Depth used for tree dumps when the caller doesn't care.
pub const DEFAULT_TREE_DEPTH: usize = 10;

pub struct AutomationEngine {
    backend: Box<dyn PlatformBackend>,
    apps: Mutex<AppManager>,
}

impl AutomationEngine {
    pub fn new(backend: impl PlatformBackend + 'static) -> Self {
        Self::with_backend(Box::new(backend))
    }

    pub fn with_backend(backend: Box<dyn PlatformBackend>) -> Self {
        Self {
            backend,
            apps: Mutex::new(AppManager::new()),
        }
    }

    /// Engine on the host's native backend. Permission and platform errors
    /// surface here, before anything runs.
    pub fn for_current_platform() -> Result<Self> {
        Ok(Self::with_backend(crate::platform::create_backend()?))
    }

    pub fn backend(&self) -> &dyn PlatformBackend {
        self.backend.as_ref()
    }

    // App lifecycle

    pub fn current_app(&self) -> Option<AppInfo> {
        self.apps.lock().current().cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.apps.lock().is_connected()
    }

    // Native launch/attach runs unlocked; the lock only guards the swap.

    pub fn launch(&self, target: &TargetApp) -> Result<AppInfo> {
        self.connected(apps::launch(self.backend(), target)?)
    }

    pub fn attach(&self, identifier: &str) -> Result<AppInfo> {
        self.connected(apps::attach(self.backend(), identifier)?)
    }

    pub fn launch_or_attach(&self, target: &TargetApp) -> Result<AppInfo> {
        self.connected(apps::launch_or_attach(self.backend(), target)?)
    }

    fn connected(&self, app: AppInfo) -> Result<AppInfo> {
        self.apps.lock().connect(app.clone());
        Ok(app)
    }

    pub fn disconnect(&self) {
        if let Some(app) = self.apps.lock().disconnect() {
            tracing::info!(app = %app.name, "disconnected from application");
        }
    }

    /// Terminates the current app and drops the reference.
    pub fn terminate_app(&self) -> Result<()> {
        let app = self.require_app()?;
        self.backend.terminate_application(&app)?;
        self.apps.lock().disconnect();
        tracing::info!(app = %app.name, "terminated application");
        Ok(())
    }

    pub fn list_running_applications(&self) -> Result<Vec<AppInfo>> {
        self.backend.list_running_applications()
    }

    fn require_app(&self) -> Result<AppInfo> {
        self.current_app().ok_or_else(Error::not_connected)
    }

    // Discovery

    pub fn find_element(&self, locator: &LocatorStrategy) -> Result<UIElement> {
        let app = self.require_app()?;
        self.backend.find_element(&app, locator)
    }

    pub fn find_elements(&self, locator: &LocatorStrategy) -> Result<Vec<UIElement>> {
        let app = self.require_app()?;
        self.backend.find_elements(&app, locator)
    }

    /// One search per link, no waiting. `Ok(None)` when nothing matches.
    pub fn try_find(&self, locator: &LocatorStrategy) -> Result<Option<UIElement>> {
        let mut quick = locator.clone();
        let mut link = Some(&mut quick);
        while let Some(l) = link {
            l.timeout = 0.0;
            link = l.fallback.as_deref_mut();
        }
        match self.find_element(&quick) {
            Ok(el) => Ok(Some(el)),
            Err(e) if e.code == ErrorCode::ElementNotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn element_at_point(&self, x: f64, y: f64) -> Result<Option<UIElement>> {
        self.backend.element_at_point(x, y)
    }

    pub fn focused_element(&self) -> Result<Option<UIElement>> {
        let app = self.current_app();
        self.backend.focused_element(app.as_ref())
    }

    pub fn element_text(&self, element: &UIElement) -> Result<String> {
        self.backend.element_text(element)
    }

    pub fn element_tree(&self, max_depth: usize) -> Result<ElementNode> {
        let app = self.require_app()?;
        self.backend.element_tree(&app, max_depth)
    }

    // Actions

    pub fn click(&self, element: &UIElement) -> Result<()> {
        self.backend.click(element)
    }

    pub fn double_click(&self, element: &UIElement) -> Result<()> {
        self.backend.double_click(element)
    }

    pub fn right_click(&self, element: &UIElement) -> Result<()> {
        self.backend.right_click(element)
    }

    pub fn type_text(&self, element: &UIElement, text: &str) -> Result<()> {
        self.backend.type_text(element, text)
    }

    pub fn type_keys(&self, text: &str) -> Result<()> {
        self.backend.type_keys(text)
    }

    pub fn key_combo(&self, keys: &[String]) -> Result<()> {
        self.backend.key_combo(keys)
    }

    /// Screenshot of the current app's window, or of `region` / the screen.
    pub fn take_screenshot(&self, region: Option<Bounds>) -> Vec<u8> {
        let app = self.current_app();
        self.backend.take_screenshot(region, app.as_ref())
    }
}
