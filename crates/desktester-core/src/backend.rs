//! Platform backend contract
//!
//! One implementation per OS accessibility/input stack, picked at startup by
//! [`crate::platform::create_backend`]. Everything above this trait
//! (resolution, the engine, recording, execution) is platform-neutral.

use crate::element::{Bounds, ElementNode, UIElement};
use crate::error::Result;
use crate::locator::LocatorStrategy;
use crate::resolve::{self, ResolveOptions};
use serde::{Deserialize, Serialize};

/// A running application as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub pid: i32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bundle_id: Option<String>,
}

impl AppInfo {
    /// Does `identifier` name this app by bundle id, display name or pid?
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        if self.bundle_id.as_deref() == Some(identifier) || self.name == identifier {
            return true;
        }
        identifier
            .parse::<i32>()
            .map(|pid| pid == self.pid)
            .unwrap_or(false)
    }
}

pub trait PlatformBackend: Send + Sync {
    /// Short platform tag, e.g. `"macos"`.
    fn platform(&self) -> &'static str;

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
    }

    /// Depth-first, pre-order snapshot of the app's tree, bounded by `max_depth`.
    fn snapshot(&self, app: &AppInfo, max_depth: usize) -> Result<Vec<UIElement>>;

    /// Nested dump of the app's tree.
    fn element_tree(&self, app: &AppInfo, max_depth: usize) -> Result<ElementNode>;

    /// Polls and walks the fallback chain; see [`resolve::find_element`].
    fn find_element(&self, app: &AppInfo, locator: &LocatorStrategy) -> Result<UIElement> {
        resolve::find_element(self, app, locator, &self.resolve_options())
    }

    /// Every current match of the primary locator, in traversal order. No polling.
    fn find_elements(&self, app: &AppInfo, locator: &LocatorStrategy) -> Result<Vec<UIElement>> {
        resolve::find_elements(self, app, locator, &self.resolve_options())
    }

    fn element_at_point(&self, x: f64, y: f64) -> Result<Option<UIElement>>;

    /// Element with keyboard focus. Backends without focus queries return `None`.
    fn focused_element(&self, _app: Option<&AppInfo>) -> Result<Option<UIElement>> {
        Ok(None)
    }

    /// Own text, else space-joined descendant text (see [`crate::element::collect_text`]).
    fn element_text(&self, element: &UIElement) -> Result<String>;

    fn click(&self, element: &UIElement) -> Result<()>;
    fn double_click(&self, element: &UIElement) -> Result<()>;
    fn right_click(&self, element: &UIElement) -> Result<()>;

    /// Sets the value natively when possible, else focuses and types.
    fn type_text(&self, element: &UIElement, text: &str) -> Result<()>;

    /// Types into whatever has focus.
    fn type_keys(&self, text: &str) -> Result<()>;

    /// Presses modifiers + regular keys together. Unknown key names are skipped.
    fn key_combo(&self, keys: &[String]) -> Result<()>;

    fn launch_application(&self, path: &str, args: &[String]) -> Result<AppInfo>;
    fn attach_to_application(&self, identifier: &str) -> Result<AppInfo>;
    fn terminate_application(&self, app: &AppInfo) -> Result<()>;

    /// Regular (user-facing) apps, sorted by name.
    fn list_running_applications(&self) -> Result<Vec<AppInfo>>;

    /// PNG bytes of the app's front window, a region, or the full screen.
    /// Empty on failure.
    fn take_screenshot(&self, region: Option<Bounds>, app: Option<&AppInfo>) -> Vec<u8>;
}
