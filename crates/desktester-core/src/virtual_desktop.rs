//! In-memory backend
//!
//! `VirtualDesktop` keeps a scripted set of applications with element trees
//! and records every action it is asked to perform. It implements the whole
//! backend contract deterministically, which makes it the backend of choice
//! for dry runs and for exercising recording and execution on any host.
//!
//! Clones share state, so a test can hand one clone to the engine and keep
//! another to mutate the UI or inspect the action log.

use crate::backend::{AppInfo, PlatformBackend};
use crate::element::{collect_text, Bounds, ElementNode, NativeHandle, UIElement};
use crate::error::{Error, Result};
use crate::keys::{KeyCombo, Modifiers};
use crate::resolve::ResolveOptions;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Something the desktop was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { x: f64, y: f64 },
    DoubleClick { x: f64, y: f64 },
    RightClick { x: f64, y: f64 },
    SetValue { path: String, text: String },
    TypeKeys(String),
    KeyCombo(Vec<String>),
    Launch(String),
    Terminate(i32),
}

#[derive(Debug, Clone)]
pub struct VirtualNode {
    pub role: String,
    pub title: Option<String>,
    pub label: Option<String>,
    pub value: Option<String>,
    pub identifier: Option<String>,
    pub bounds: Bounds,
    pub enabled: bool,
    pub visible: bool,
    pub children: Vec<VirtualNode>,
}

impl VirtualNode {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            title: None,
            label: None,
            value: None,
            identifier: None,
            bounds: Bounds::default(),
            enabled: true,
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child(mut self, child: VirtualNode) -> Self {
        self.children.push(child);
        self
    }

    /// First node (pre-order) with this identifier.
    pub fn find_mut(&mut self, identifier: &str) -> Option<&mut VirtualNode> {
        if self.identifier.as_deref() == Some(identifier) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(identifier))
    }

    fn find(&self, identifier: &str) -> Option<&VirtualNode> {
        if self.identifier.as_deref() == Some(identifier) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(identifier))
    }

    fn at(&self, path: &[usize]) -> Option<&VirtualNode> {
        match path.split_first() {
            None => Some(self),
            Some((i, rest)) => self.children.get(*i)?.at(rest),
        }
    }

    fn at_mut(&mut self, path: &[usize]) -> Option<&mut VirtualNode> {
        match path.split_first() {
            None => Some(self),
            Some((i, rest)) => self.children.get_mut(*i)?.at_mut(rest),
        }
    }

    fn snapshot(&self) -> UIElement {
        let mut el = UIElement::new(self.role.clone()).with_bounds(self.bounds);
        el.title = self.title.clone();
        el.label = self.label.clone();
        el.value = self.value.clone();
        el.identifier = self.identifier.clone();
        el.enabled = self.enabled;
        el.visible = self.visible;
        el
    }
}

#[derive(Debug, Clone)]
pub struct VirtualApp {
    pub name: String,
    pub bundle_id: Option<String>,
    pub path: Option<String>,
    pub root: VirtualNode,
}

impl VirtualApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bundle_id: None,
            path: None,
            root: VirtualNode::new("application"),
        }
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_root(mut self, root: VirtualNode) -> Self {
        self.root = root;
        self
    }

    fn launchable_as(&self, identifier: &str) -> bool {
        self.path.as_deref() == Some(identifier)
            || self.bundle_id.as_deref() == Some(identifier)
            || self.name == identifier
    }
}

/// Handle stored in elements produced by this backend.
#[derive(Debug, Clone)]
struct VirtualRef {
    pid: i32,
    path: Vec<usize>,
}

struct Running {
    info: AppInfo,
    root: VirtualNode,
}

struct DesktopState {
    installed: Vec<VirtualApp>,
    running: Vec<Running>,
    next_pid: i32,
    actions: Vec<Action>,
    focus: Option<VirtualRef>,
    select_all: bool,
    screenshot: Vec<u8>,
    focus_queries: bool,
}

impl DesktopState {
    fn app(&self, pid: i32) -> Result<&Running> {
        self.running
            .iter()
            .find(|r| r.info.pid == pid)
            .ok_or_else(|| Error::application_not_found(&pid.to_string()))
    }

    fn node(&self, r: &VirtualRef) -> Result<&VirtualNode> {
        self.app(r.pid)?
            .root
            .at(&r.path)
            .ok_or_else(|| Error::action_failed("lookup", "element no longer exists"))
    }

    fn node_mut(&mut self, r: &VirtualRef) -> Result<&mut VirtualNode> {
        let app = self
            .running
            .iter_mut()
            .find(|a| a.info.pid == r.pid)
            .ok_or_else(|| Error::application_not_found(&r.pid.to_string()))?;
        app.root
            .at_mut(&r.path)
            .ok_or_else(|| Error::action_failed("lookup", "element no longer exists"))
    }

    fn spawn(&mut self, app: VirtualApp) -> AppInfo {
        let info = AppInfo {
            name: app.name.clone(),
            pid: self.next_pid,
            bundle_id: app.bundle_id.clone(),
        };
        self.next_pid += 1;
        self.running.push(Running {
            info: info.clone(),
            root: app.root,
        });
        info
    }
}

#[derive(Clone)]
pub struct VirtualDesktop {
    state: Arc<Mutex<DesktopState>>,
    poll_interval: Duration,
}

impl VirtualDesktop {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DesktopState {
                installed: Vec::new(),
                running: Vec::new(),
                next_pid: 1000,
                actions: Vec::new(),
                focus: None,
                select_all: false,
                screenshot: Vec::new(),
                focus_queries: true,
            })),
            poll_interval: ResolveOptions::default().poll_interval,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Behave like a backend that cannot report keyboard focus.
    pub fn without_focus_queries(self) -> Self {
        self.state.lock().focus_queries = false;
        self
    }

    /// Make an app launchable by path, bundle id or name.
    pub fn install(&self, app: VirtualApp) {
        self.state.lock().installed.push(app);
    }

    /// Start an app immediately.
    pub fn spawn(&self, app: VirtualApp) -> AppInfo {
        self.state.lock().spawn(app)
    }

    pub fn update_tree<F>(&self, pid: i32, f: F)
    where
        F: FnOnce(&mut VirtualNode),
    {
        let mut state = self.state.lock();
        if let Some(app) = state.running.iter_mut().find(|a| a.info.pid == pid) {
            f(&mut app.root);
        }
    }

    pub fn set_screenshot(&self, png: Vec<u8>) {
        self.state.lock().screenshot = png;
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.state.lock().actions.clear();
    }

    pub fn is_running(&self, identifier: &str) -> bool {
        self.state
            .lock()
            .running
            .iter()
            .any(|r| r.info.matches_identifier(identifier))
    }

    /// Current value of the first node with `identifier` in any running app.
    pub fn value_of(&self, identifier: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .running
            .iter()
            .find_map(|r| r.root.find(identifier))
            .and_then(|n| n.value.clone())
    }

    fn element(node: &VirtualNode, pid: i32, path: &[usize], path_str: String) -> UIElement {
        node.snapshot()
            .with_path(path_str)
            .with_handle(NativeHandle::new(VirtualRef {
                pid,
                path: path.to_vec(),
            }))
    }

    fn walk(
        node: &VirtualNode,
        pid: i32,
        path: &mut Vec<usize>,
        path_str: String,
        depth: usize,
        max_depth: usize,
        out: &mut Vec<UIElement>,
    ) {
        if depth > max_depth {
            return;
        }
        out.push(Self::element(node, pid, path, path_str.clone()));
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            let child_str = format!("{}/{}[{}]", path_str, child.role, i);
            Self::walk(child, pid, path, child_str, depth + 1, max_depth, out);
            path.pop();
        }
    }

    fn tree(node: &VirtualNode, pid: i32, path: &mut Vec<usize>, path_str: String, depth: usize, max_depth: usize) -> ElementNode {
        let element = Self::element(node, pid, path, path_str.clone());
        let mut children = Vec::new();
        if depth < max_depth {
            for (i, child) in node.children.iter().enumerate() {
                path.push(i);
                let child_str = format!("{}/{}[{}]", path_str, child.role, i);
                children.push(Self::tree(child, pid, path, child_str, depth + 1, max_depth));
                path.pop();
            }
        }
        ElementNode { element, children }
    }

    fn deepest_at(
        node: &VirtualNode,
        x: f64,
        y: f64,
        path: &mut Vec<usize>,
        path_str: String,
        best: &mut Option<(usize, Vec<usize>, String)>,
    ) {
        if node.bounds.contains(x, y) {
            let deeper = best.as_ref().map(|(d, _, _)| path.len() >= *d).unwrap_or(true);
            if deeper {
                *best = Some((path.len(), path.clone(), path_str.clone()));
            }
        }
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            let child_str = format!("{}/{}[{}]", path_str, child.role, i);
            Self::deepest_at(child, x, y, path, child_str, best);
            path.pop();
        }
    }

    fn handle_of(element: &UIElement) -> Result<VirtualRef> {
        element
            .handle()
            .and_then(|h| h.downcast_ref::<VirtualRef>())
            .cloned()
            .ok_or_else(|| Error::action_failed("resolve handle", "element was not produced by this desktop"))
    }

    fn pointer(&self, element: &UIElement, make: fn(f64, f64) -> Action) -> Result<()> {
        let r = Self::handle_of(element)?;
        let mut state = self.state.lock();
        let node = state.node(&r)?;
        if !node.enabled {
            return Err(Error::action_failed("click", "element is disabled"));
        }
        let (x, y) = node.bounds.center();
        state.actions.push(make(x, y));
        state.focus = Some(r);
        state.select_all = false;
        Ok(())
    }
}

impl Default for VirtualDesktop {
    fn default() -> Self {
        Self::new()
    }
}

fn root_path(node: &VirtualNode) -> String {
    format!("{}[0]", node.role)
}

impl PlatformBackend for VirtualDesktop {
    fn platform(&self) -> &'static str {
        "virtual"
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            poll_interval: self.poll_interval,
            ..ResolveOptions::default()
        }
    }

    fn snapshot(&self, app: &AppInfo, max_depth: usize) -> Result<Vec<UIElement>> {
        let state = self.state.lock();
        let running = state.app(app.pid)?;
        let mut out = Vec::new();
        Self::walk(
            &running.root,
            app.pid,
            &mut Vec::new(),
            root_path(&running.root),
            0,
            max_depth,
            &mut out,
        );
        Ok(out)
    }

    fn element_tree(&self, app: &AppInfo, max_depth: usize) -> Result<ElementNode> {
        let state = self.state.lock();
        let running = state.app(app.pid)?;
        Ok(Self::tree(
            &running.root,
            app.pid,
            &mut Vec::new(),
            root_path(&running.root),
            0,
            max_depth,
        ))
    }

    fn element_at_point(&self, x: f64, y: f64) -> Result<Option<UIElement>> {
        let state = self.state.lock();
        // Most recently started app is frontmost.
        for running in state.running.iter().rev() {
            let mut best = None;
            Self::deepest_at(&running.root, x, y, &mut Vec::new(), root_path(&running.root), &mut best);
            if let Some((_, path, path_str)) = best {
                if let Some(node) = running.root.at(&path) {
                    return Ok(Some(Self::element(node, running.info.pid, &path, path_str)));
                }
            }
        }
        Ok(None)
    }

    fn focused_element(&self, _app: Option<&AppInfo>) -> Result<Option<UIElement>> {
        let state = self.state.lock();
        if !state.focus_queries {
            return Ok(None);
        }
        let Some(focus) = state.focus.clone() else {
            return Ok(None);
        };
        let node = state.node(&focus)?;
        Ok(Some(
            node.snapshot().with_handle(NativeHandle::new(focus)),
        ))
    }

    fn element_text(&self, element: &UIElement) -> Result<String> {
        let r = Self::handle_of(element)?;
        let state = self.state.lock();
        let node = state.node(&r)?;
        Ok(collect_text(
            node,
            |n| n.children.clone(),
            |n| n.snapshot().own_text(),
        ))
    }

    fn click(&self, element: &UIElement) -> Result<()> {
        self.pointer(element, |x, y| Action::Click { x, y })
    }

    fn double_click(&self, element: &UIElement) -> Result<()> {
        self.pointer(element, |x, y| Action::DoubleClick { x, y })
    }

    fn right_click(&self, element: &UIElement) -> Result<()> {
        self.pointer(element, |x, y| Action::RightClick { x, y })
    }

    fn type_text(&self, element: &UIElement, text: &str) -> Result<()> {
        let r = Self::handle_of(element)?;
        let mut state = self.state.lock();
        let node = state.node_mut(&r)?;
        node.value = Some(text.to_string());
        let path = element.path.clone().unwrap_or_default();
        state.actions.push(Action::SetValue {
            path,
            text: text.to_string(),
        });
        state.focus = Some(r);
        state.select_all = false;
        Ok(())
    }

    fn type_keys(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.actions.push(Action::TypeKeys(text.to_string()));
        let replace = std::mem::take(&mut state.select_all);
        if let Some(focus) = state.focus.clone() {
            if let Ok(node) = state.node_mut(&focus) {
                let value = node.value.get_or_insert_with(String::new);
                if replace {
                    value.clear();
                }
                value.push_str(text);
            }
        }
        Ok(())
    }

    fn key_combo(&self, keys: &[String]) -> Result<()> {
        let combo = KeyCombo::parse(keys);
        let mut state = self.state.lock();
        state.actions.push(Action::KeyCombo(keys.to_vec()));

        let shortcut = combo.modifiers.contains(Modifiers::CMD) || combo.modifiers.contains(Modifiers::CTRL);
        let key = combo.keys.first().map(|k| k.to_lowercase());
        match key.as_deref() {
            Some("a") if shortcut => state.select_all = true,
            Some("backspace") | Some("delete") => {
                let clear = std::mem::take(&mut state.select_all);
                if let Some(focus) = state.focus.clone() {
                    if let Ok(node) = state.node_mut(&focus) {
                        if let Some(value) = node.value.as_mut() {
                            if clear {
                                value.clear();
                            } else {
                                value.pop();
                            }
                        }
                    }
                }
            }
            _ => state.select_all = false,
        }
        Ok(())
    }

    fn launch_application(&self, path: &str, _args: &[String]) -> Result<AppInfo> {
        let mut state = self.state.lock();
        let app = state
            .installed
            .iter()
            .find(|a| a.launchable_as(path))
            .cloned()
            .ok_or_else(|| Error::application_not_found(path))?;
        state.actions.push(Action::Launch(path.to_string()));
        Ok(state.spawn(app))
    }

    fn attach_to_application(&self, identifier: &str) -> Result<AppInfo> {
        let state = self.state.lock();
        state
            .running
            .iter()
            .map(|r| &r.info)
            .find(|info| info.matches_identifier(identifier))
            .cloned()
            .ok_or_else(|| Error::application_not_found(identifier))
    }

    fn terminate_application(&self, app: &AppInfo) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.running.len();
        state.running.retain(|r| r.info.pid != app.pid);
        if state.running.len() == before {
            return Err(Error::application_not_found(&app.name));
        }
        if state.focus.as_ref().map(|f| f.pid) == Some(app.pid) {
            state.focus = None;
        }
        state.actions.push(Action::Terminate(app.pid));
        Ok(())
    }

    fn list_running_applications(&self) -> Result<Vec<AppInfo>> {
        let state = self.state.lock();
        let mut apps: Vec<AppInfo> = state.running.iter().map(|r| r.info.clone()).collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    fn take_screenshot(&self, _region: Option<Bounds>, app: Option<&AppInfo>) -> Vec<u8> {
        let state = self.state.lock();
        if let Some(app) = app {
            if state.app(app.pid).is_err() {
                return Vec::new();
            }
        }
        state.screenshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorStrategy;
    use pretty_assertions::assert_eq;

    fn form() -> VirtualNode {
        VirtualNode::new("window")
            .title("Form")
            .bounds(Bounds::new(0.0, 0.0, 200.0, 200.0))
            .child(
                VirtualNode::new("text_field")
                    .identifier("name")
                    .value("Ada")
                    .bounds(Bounds::new(10.0, 10.0, 100.0, 20.0)),
            )
            .child(
                VirtualNode::new("group")
                    .bounds(Bounds::new(10.0, 50.0, 150.0, 100.0))
                    .child(VirtualNode::new("static_text").value("Hello"))
                    .child(VirtualNode::new("static_text").title("world")),
            )
    }

    #[test]
    fn paths_and_point_lookup() {
        let desktop = VirtualDesktop::new();
        let app = desktop.spawn(VirtualApp::new("Form").with_root(form()));
        let el = desktop.find_element(&app, &LocatorStrategy::id("name")).unwrap();
        assert_eq!(el.path.as_deref(), Some("window[0]/text_field[0]"));

        let hit = desktop.element_at_point(20.0, 15.0).unwrap().unwrap();
        assert_eq!(hit.identifier.as_deref(), Some("name"));
        let hit = desktop.element_at_point(190.0, 190.0).unwrap().unwrap();
        assert_eq!(hit.role, "window");
        assert!(desktop.element_at_point(500.0, 500.0).unwrap().is_none());
    }

    #[test]
    fn text_falls_back_to_descendants() {
        let desktop = VirtualDesktop::new();
        let app = desktop.spawn(VirtualApp::new("Form").with_root(form()));
        let group = desktop
            .find_element(&app, &LocatorStrategy::path("window[0]/group[1]"))
            .unwrap();
        assert_eq!(desktop.element_text(&group).unwrap(), "Hello world");
    }

    #[test]
    fn select_all_then_backspace_clears_focus() {
        let desktop = VirtualDesktop::new();
        let app = desktop.spawn(VirtualApp::new("Form").with_root(form()));
        let field = desktop.find_element(&app, &LocatorStrategy::id("name")).unwrap();
        desktop.click(&field).unwrap();
        desktop.key_combo(&["cmd".to_string(), "a".to_string()]).unwrap();
        desktop.key_combo(&["backspace".to_string()]).unwrap();
        assert_eq!(desktop.value_of("name").as_deref(), Some(""));
        desktop.type_keys("Grace").unwrap();
        assert_eq!(desktop.value_of("name").as_deref(), Some("Grace"));
    }

    #[test]
    fn launch_attach_terminate() {
        let desktop = VirtualDesktop::new();
        desktop.install(VirtualApp::new("Notes").with_bundle_id("com.example.notes"));
        assert!(desktop.attach_to_application("Notes").is_err());

        let app = desktop.launch_application("com.example.notes", &[]).unwrap();
        assert_eq!(desktop.attach_to_application("Notes").unwrap(), app);
        assert_eq!(desktop.list_running_applications().unwrap(), vec![app.clone()]);

        desktop.terminate_application(&app).unwrap();
        assert!(!desktop.is_running("Notes"));
        assert!(desktop.terminate_application(&app).is_err());
    }
}
