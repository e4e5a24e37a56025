//! Windows backend
//!
//! UI Automation for the element tree, SendInput for input, ToolHelp for
//! process lookup. COM is initialized per calling thread.

mod accessibility;
mod input;
mod processes;

use crate::backend::{AppInfo, PlatformBackend};
use crate::element::{Bounds, ElementNode, UIElement};
use crate::error::{Error, Result};
use crate::keys::KeyCombo;
use accessibility::{Automation, Element};
use input::Button;
use std::thread;
use std::time::{Duration, Instant};
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);
const LAUNCH_POLL: Duration = Duration::from_millis(500);
const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Idempotent per thread; a thread already in another apartment is fine too.
pub(crate) fn init_com() -> Result<()> {
    let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
    if hr.is_err() {
        tracing::debug!(hr = ?hr, "CoInitializeEx returned an error, continuing");
    }
    Ok(())
}

/// UI Automation needs no permission grant.
pub fn ensure_accessibility() -> Result<()> {
    Automation::new().map(|_| ())
}

pub struct WindowsBackend {
    _private: (),
}

impl WindowsBackend {
    pub fn new() -> Result<Self> {
        ensure_accessibility()?;
        Ok(Self { _private: () })
    }

    fn native(element: &UIElement) -> Option<Element> {
        element.handle().and_then(|h| h.downcast_ref::<Element>()).cloned()
    }

    fn pointer(&self, element: &UIElement, button: Button, clicks: u8) -> Result<()> {
        if element.bounds.width <= 0.0 || element.bounds.height <= 0.0 {
            return Err(Error::action_failed("click", "element has no on-screen bounds"));
        }
        let (x, y) = element.center();
        input::click_at(x, y, button, clicks)
    }

    fn app_info(pid: i32, name: Option<String>) -> AppInfo {
        AppInfo {
            name: name.or_else(|| processes::name_of(pid)).unwrap_or_else(|| pid.to_string()),
            pid,
            bundle_id: None,
        }
    }

    fn find_running(identifier: &str) -> Result<Option<AppInfo>> {
        let automation = Automation::new()?;
        let windowed = automation.windowed_pids()?;
        let wanted = processes::exe_stem(identifier).to_lowercase();
        Ok(processes::processes()
            .into_iter()
            .filter(|p| windowed.contains(&p.pid))
            .map(|p| Self::app_info(p.pid, Some(p.name)))
            .find(|app| app.matches_identifier(identifier) || app.name.to_lowercase() == wanted))
    }
}

impl PlatformBackend for WindowsBackend {
    fn platform(&self) -> &'static str {
        "windows"
    }

    fn snapshot(&self, app: &AppInfo, max_depth: usize) -> Result<Vec<UIElement>> {
        let automation = Automation::new()?;
        let windows = automation.windows_of(app.pid)?;
        Ok(automation.walker()?.walk(&windows, max_depth))
    }

    fn element_tree(&self, app: &AppInfo, max_depth: usize) -> Result<ElementNode> {
        let automation = Automation::new()?;
        let walker = automation.walker()?;
        let children = automation
            .windows_of(app.pid)?
            .iter()
            .enumerate()
            .map(|(i, w)| walker.tree(w, format!("{}[{}]", w.role(), i), 0, max_depth))
            .collect();
        Ok(ElementNode {
            element: UIElement::new("application").with_title(app.name.clone()),
            children,
        })
    }

    fn element_at_point(&self, x: f64, y: f64) -> Result<Option<UIElement>> {
        let automation = Automation::new()?;
        Ok(automation
            .element_at(x.round() as i32, y.round() as i32)
            .map(|e| e.snapshot(None)))
    }

    fn focused_element(&self, _app: Option<&AppInfo>) -> Result<Option<UIElement>> {
        let automation = Automation::new()?;
        Ok(automation.focused().map(|e| e.snapshot(None)))
    }

    fn element_text(&self, element: &UIElement) -> Result<String> {
        match Self::native(element) {
            Some(native) => {
                let automation = Automation::new()?;
                Ok(automation.walker()?.text(&native))
            }
            None => Ok(element.own_text().unwrap_or_default()),
        }
    }

    fn click(&self, element: &UIElement) -> Result<()> {
        if let Some(native) = Self::native(element) {
            if native.invoke() {
                return Ok(());
            }
            tracing::debug!(role = %element.role, "Invoke pattern unavailable, synthesizing click");
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
        if let Some(native) = Self::native(element) {
            if native.set_value(text) {
                return Ok(());
            }
            native.focus();
        }
        tracing::debug!(role = %element.role, "Value pattern unavailable, typing instead");
        self.pointer(element, Button::Left, 1)?;
        thread::sleep(Duration::from_millis(100));
        input::type_chars(text)
    }

    fn type_keys(&self, text: &str) -> Result<()> {
        input::type_chars(text)
    }

    fn key_combo(&self, keys: &[String]) -> Result<()> {
        let skipped = input::key_combo(&KeyCombo::parse(keys))?;
        if !skipped.is_empty() {
            tracing::debug!(?skipped, "no virtual-key code for keys, skipped");
        }
        Ok(())
    }

    fn launch_application(&self, path: &str, args: &[String]) -> Result<AppInfo> {
        let pid = processes::spawn(path, args)?;
        let name = processes::exe_stem(path);
        let deadline = Instant::now() + LAUNCH_TIMEOUT;
        loop {
            let automation = Automation::new()?;
            if !automation.windows_of(pid)?.is_empty() {
                return Ok(Self::app_info(pid, Some(name)));
            }
            // Launcher stubs hand off to a differently-numbered process.
            if let Some(app) = Self::find_running(&name)? {
                return Ok(app);
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(&format!("launch of {}", path), LAUNCH_TIMEOUT.as_secs_f64()));
            }
            thread::sleep(LAUNCH_POLL);
        }
    }

    fn attach_to_application(&self, identifier: &str) -> Result<AppInfo> {
        Self::find_running(identifier)?.ok_or_else(|| Error::application_not_found(identifier))
    }

    fn terminate_application(&self, app: &AppInfo) -> Result<()> {
        if !processes::alive(app.pid) {
            return Err(Error::application_not_found(&app.name));
        }
        processes::terminate(app.pid)?;
        let deadline = Instant::now() + TERMINATE_TIMEOUT;
        while processes::alive(app.pid) {
            if Instant::now() >= deadline {
                return Err(Error::timeout(&format!("terminate {}", app.name), TERMINATE_TIMEOUT.as_secs_f64()));
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }

    fn list_running_applications(&self) -> Result<Vec<AppInfo>> {
        let automation = Automation::new()?;
        let windowed = automation.windowed_pids()?;
        let mut apps: Vec<AppInfo> = processes::processes()
            .into_iter()
            .filter(|p| windowed.contains(&p.pid))
            .map(|p| Self::app_info(p.pid, Some(p.name)))
            .collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    fn take_screenshot(&self, region: Option<Bounds>, app: Option<&AppInfo>) -> Vec<u8> {
        crate::screenshot::capture(region, app)
    }
}
