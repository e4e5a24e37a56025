//! macOS backend
//!
//! Accessibility API (AX) for the element tree and Core Graphics (CG) events
//! for input, both via cidre.

mod apps;
mod ax;
mod input;

use crate::backend::{AppInfo, PlatformBackend};
use crate::element::{Bounds, ElementNode, UIElement};
use crate::error::{Error, Result};
use crate::keys::KeyCombo;
use cidre::arc::R;
use cidre::ax as cax;
use input::Button;
use std::thread;
use std::time::Duration;

pub fn has_accessibility() -> bool {
    cax::is_process_trusted()
}

/// Prompts the user (once per process) when permission is missing.
pub fn ensure_accessibility() -> Result<()> {
    if has_accessibility() {
        return Ok(());
    }
    cax::is_process_trusted_with_prompt(true);
    Err(Error::permission_denied(
        "Accessibility permissions required. Enable in System Settings > Privacy & Security > Accessibility",
    ))
}

pub struct MacBackend {
    _private: (),
}

impl MacBackend {
    pub fn new() -> Result<Self> {
        ensure_accessibility()?;
        Ok(Self { _private: () })
    }

    fn native(element: &UIElement) -> Result<R<cax::UiElement>> {
        element
            .handle()
            .and_then(|h| h.downcast_ref::<R<cax::UiElement>>())
            .cloned()
            .ok_or_else(|| Error::action_failed("resolve handle", "element has no accessibility handle"))
    }

    fn pointer(&self, element: &UIElement, button: Button, clicks: u8) -> Result<()> {
        if element.bounds.width <= 0.0 || element.bounds.height <= 0.0 {
            return Err(Error::action_failed("click", "element has no on-screen bounds"));
        }
        let (x, y) = element.center();
        input::click_at(x, y, button, clicks);
        Ok(())
    }
}

impl PlatformBackend for MacBackend {
    fn platform(&self) -> &'static str {
        "macos"
    }

    fn snapshot(&self, app: &AppInfo, max_depth: usize) -> Result<Vec<UIElement>> {
        let root = ax::app_element(app.pid);
        Ok(ax::walk(&root, max_depth))
    }

    fn element_tree(&self, app: &AppInfo, max_depth: usize) -> Result<ElementNode> {
        let root = ax::app_element(app.pid);
        Ok(ax::tree(&root, max_depth))
    }

    fn element_at_point(&self, x: f64, y: f64) -> Result<Option<UIElement>> {
        Ok(ax::element_at(x, y).map(|e| ax::to_element(&e, None)))
    }

    fn focused_element(&self, app: Option<&AppInfo>) -> Result<Option<UIElement>> {
        let root = match app {
            Some(app) => ax::app_element(app.pid),
            None => cax::UiElement::sys_wide(),
        };
        Ok(ax::focused_element(&root).map(|e| ax::to_element(&e, None)))
    }

    fn element_text(&self, element: &UIElement) -> Result<String> {
        match Self::native(element) {
            Ok(native) => Ok(ax::text(&native)),
            Err(_) => Ok(element.own_text().unwrap_or_default()),
        }
    }

    fn click(&self, element: &UIElement) -> Result<()> {
        if let Ok(native) = Self::native(element) {
            if ax::press(&native) {
                return Ok(());
            }
            tracing::debug!(role = %element.role, "AXPress refused, synthesizing click");
        }
        self.pointer(element, Button::Left, 1)
    }

    fn double_click(&self, element: &UIElement) -> Result<()> {
        self.pointer(element, Button::Left, 2)
    }

    fn right_click(&self, element: &UIElement) -> Result<()> {
        self.pointer(element, Button::Right, 1)
    }

    fn type_text(&self, element: &UIElement, text: &str) -> Result<()> {
        if let Ok(native) = Self::native(element) {
            if ax::set_value(&native, text) {
                return Ok(());
            }
        }
        tracing::debug!(role = %element.role, "AXValue not settable, typing instead");
        self.click(element)?;
        thread::sleep(Duration::from_millis(100));
        input::type_chars(text);
        Ok(())
    }

    fn type_keys(&self, text: &str) -> Result<()> {
        input::type_chars(text);
        Ok(())
    }

    fn key_combo(&self, keys: &[String]) -> Result<()> {
        let combo = KeyCombo::parse(keys);
        let skipped = input::key_combo(&combo);
        if !skipped.is_empty() {
            tracing::debug!(?skipped, "no key code for keys, skipped");
        }
        Ok(())
    }

    fn launch_application(&self, path: &str, args: &[String]) -> Result<AppInfo> {
        apps::launch(path, args)
    }

    fn attach_to_application(&self, identifier: &str) -> Result<AppInfo> {
        apps::find_running(identifier).ok_or_else(|| Error::application_not_found(identifier))
    }

    fn terminate_application(&self, app: &AppInfo) -> Result<()> {
        apps::terminate(app)
    }

    fn list_running_applications(&self) -> Result<Vec<AppInfo>> {
        Ok(apps::running_apps())
    }

    fn take_screenshot(&self, region: Option<Bounds>, app: Option<&AppInfo>) -> Vec<u8> {
        crate::screenshot::capture(region, app)
    }
}
