//! UI element snapshots
//!
//! A `UIElement` is a copy of one accessibility node's attributes taken at
//! query time. The native handle inside is only meaningful until the next UI
//! mutation, so elements are never cached: every lookup goes back to the tree.

use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Depth bound for descendant text extraction.
pub const TEXT_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, serde::Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive on all edges; zero-sized bounds never contain anything.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Backend-specific node reference. Not `Send`: it belongs to the thread that
/// ran the query.
#[derive(Clone)]
pub struct NativeHandle(Rc<dyn Any>);

impl NativeHandle {
    pub fn new<T: 'static>(inner: T) -> Self {
        Self(Rc::new(inner))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeHandle(..)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UIElement {
    /// Canonical role name, see [`crate::roles`].
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub bounds: Bounds,
    pub enabled: bool,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip)]
    handle: Option<NativeHandle>,
}

impl UIElement {
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
            path: None,
            handle: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_handle(mut self, handle: NativeHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn handle(&self) -> Option<&NativeHandle> {
        self.handle.as_ref()
    }

    pub fn center(&self) -> (f64, f64) {
        self.bounds.center()
    }

    /// The element's own text: value first, then title, with control
    /// characters removed. Empty strings count as absent.
    pub fn own_text(&self) -> Option<String> {
        [self.value.as_deref(), self.title.as_deref()]
            .into_iter()
            .flatten()
            .map(strip_control)
            .find(|s| !s.is_empty())
    }

    /// Best human-readable name, used in step descriptions.
    pub fn display_name(&self) -> Option<&str> {
        [
            self.title.as_deref(),
            self.label.as_deref(),
            self.value.as_deref(),
            self.identifier.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
    }
}

/// Nested snapshot returned by tree dumps.
#[derive(Debug, Clone, Serialize)]
pub struct ElementNode {
    #[serde(flatten)]
    pub element: UIElement,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ElementNode::count).sum::<usize>()
    }
}

fn strip_control(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}

/// Text of a node: its own text if any, else the space-joined text of its
/// descendants. A child with text contributes it and is not descended into.
pub fn collect_text<N, C, T>(node: &N, children: C, own_text: T) -> String
where
    C: Fn(&N) -> Vec<N>,
    T: Fn(&N) -> Option<String>,
{
    if let Some(text) = own_text(node) {
        return text;
    }
    let mut parts = Vec::new();
    collect_descendants(node, &children, &own_text, 0, &mut parts);
    parts.join(" ")
}

fn collect_descendants<N, C, T>(node: &N, children: &C, own_text: &T, depth: usize, parts: &mut Vec<String>)
where
    C: Fn(&N) -> Vec<N>,
    T: Fn(&N) -> Option<String>,
{
    if depth > TEXT_DEPTH {
        return;
    }
    for child in children(node) {
        match own_text(&child) {
            Some(text) => parts.push(text),
            None => collect_descendants(&child, children, own_text, depth + 1, parts),
        }
    }
}
