//! Accessibility API helpers
//!
//! cidre covers roles, children and actions. Position/size unpacking and
//! attribute writes go through the raw AX calls it doesn't expose.

use crate::element::{collect_text, Bounds, ElementNode, NativeHandle, UIElement};
use crate::roles::normalize_mac_role;
use cidre::arc::R;
use cidre::{ax, cf, cg};
use std::ffi::c_void;

const AX_SUCCESS: i32 = 0;
const AX_VALUE_CG_POINT: u32 = 1;
const AX_VALUE_CG_SIZE: u32 = 2;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXValueGetValue(value: *const c_void, the_type: u32, value_ptr: *mut c_void) -> bool;
    fn AXUIElementSetAttributeValue(element: *const c_void, attribute: *const c_void, value: *const c_void) -> i32;
}

/// Attribute by name, for the ones cidre has no accessor for.
fn named_attr(name: &str) -> R<cf::String> {
    cf::String::from_str(name)
}

fn as_attr(name: &cf::String) -> &ax::Attr {
    unsafe { std::mem::transmute(name) }
}

pub fn string_attr(element: &ax::UiElement, attr: &ax::Attr) -> Option<String> {
    element.attr_value(attr).ok().and_then(|v| {
        if v.get_type_id() == cf::String::type_id() {
            let s: &cf::String = unsafe { std::mem::transmute(&*v) };
            Some(s.to_string())
        } else {
            None
        }
    })
}

fn named_string_attr(element: &ax::UiElement, name: &str) -> Option<String> {
    let attr = named_attr(name);
    string_attr(element, as_attr(&attr))
}

fn named_bool_attr(element: &ax::UiElement, name: &str) -> Option<bool> {
    let attr = named_attr(name);
    element.attr_value(as_attr(&attr)).ok().and_then(|v| {
        if v.get_type_id() == cf::Boolean::type_id() {
            let b: &cf::Boolean = unsafe { std::mem::transmute(&*v) };
            Some(b.value())
        } else {
            None
        }
    })
}

fn ax_value<T: Default>(element: &ax::UiElement, name: &str, kind: u32) -> Option<T> {
    let attr = named_attr(name);
    let v = element.attr_value(as_attr(&attr)).ok()?;
    let mut out = T::default();
    let ok = unsafe {
        AXValueGetValue(
            &*v as *const cf::Type as *const c_void,
            kind,
            &mut out as *mut T as *mut c_void,
        )
    };
    ok.then_some(out)
}

pub fn role_name(element: &ax::UiElement) -> Option<String> {
    let role = element.role().ok()?;
    let debug = format!("{:?}", role);
    let start = debug.find("AX")?;
    let rest = &debug[start..];
    let end = rest.find(|c| c == ')' || c == '"' || c == '}').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

pub fn bounds(element: &ax::UiElement) -> Bounds {
    let pos: Option<cg::Point> = ax_value(element, "AXPosition", AX_VALUE_CG_POINT);
    let size: Option<cg::Size> = ax_value(element, "AXSize", AX_VALUE_CG_SIZE);
    match (pos, size) {
        (Some(p), Some(s)) => Bounds::new(p.x, p.y, s.width, s.height),
        _ => Bounds::default(),
    }
}

pub fn children(element: &ax::UiElement) -> Vec<R<ax::UiElement>> {
    element
        .children()
        .ok()
        .map(|children| children.iter().map(|c| c.retained()).collect())
        .unwrap_or_default()
}

fn element_attr(element: &ax::UiElement, attr: &ax::Attr) -> Option<R<ax::UiElement>> {
    let v = element.attr_value(attr).ok()?;
    if v.get_type_id() == ax::UiElement::type_id() {
        let el: &ax::UiElement = unsafe { std::mem::transmute(&*v) };
        Some(el.retained())
    } else {
        None
    }
}

pub fn focused_element(root: &ax::UiElement) -> Option<R<ax::UiElement>> {
    let attr = named_attr("AXFocusedUIElement");
    element_attr(root, as_attr(&attr))
}

/// Snapshot one node. `path` is only known when the node was reached by a walk.
pub fn to_element(element: &ax::UiElement, path: Option<String>) -> UIElement {
    let native = role_name(element).unwrap_or_else(|| "AXUnknown".to_string());
    let bounds = bounds(element);
    let mut el = UIElement::new(normalize_mac_role(&native))
        .with_bounds(bounds)
        .with_handle(NativeHandle::new(element.retained()));
    el.title = string_attr(element, ax::attr::title()).filter(|s| !s.is_empty());
    el.label = string_attr(element, ax::attr::desc()).filter(|s| !s.is_empty());
    el.value = string_attr(element, ax::attr::value());
    el.identifier = named_string_attr(element, "AXIdentifier").filter(|s| !s.is_empty());
    el.enabled = named_bool_attr(element, "AXEnabled").unwrap_or(true);
    el.visible = bounds.width > 0.0 && bounds.height > 0.0;
    el.path = path;
    el
}

fn segment(element: &ax::UiElement, index: usize) -> String {
    let role = role_name(element).map(|r| normalize_mac_role(&r)).unwrap_or_default();
    format!("{}[{}]", role, index)
}

/// Depth-first pre-order walk collecting every node down to `max_depth`.
pub fn walk(root: &ax::UiElement, max_depth: usize) -> Vec<UIElement> {
    let mut out = Vec::new();
    walk_recursive(root, segment(root, 0), 0, max_depth, &mut out);
    out
}

fn walk_recursive(element: &ax::UiElement, path: String, depth: usize, max_depth: usize, out: &mut Vec<UIElement>) {
    if depth > max_depth {
        return;
    }
    out.push(to_element(element, Some(path.clone())));
    for (i, child) in children(element).iter().enumerate() {
        let child_path = format!("{}/{}", path, segment(child, i));
        walk_recursive(child, child_path, depth + 1, max_depth, out);
    }
}

pub fn tree(root: &ax::UiElement, max_depth: usize) -> ElementNode {
    tree_recursive(root, segment(root, 0), 0, max_depth)
}

fn tree_recursive(element: &ax::UiElement, path: String, depth: usize, max_depth: usize) -> ElementNode {
    let mut node = ElementNode {
        element: to_element(element, Some(path.clone())),
        children: Vec::new(),
    };
    if depth < max_depth {
        for (i, child) in children(element).iter().enumerate() {
            let child_path = format!("{}/{}", path, segment(child, i));
            node.children.push(tree_recursive(child, child_path, depth + 1, max_depth));
        }
    }
    node
}

pub fn text(element: &ax::UiElement) -> String {
    collect_text(
        &element.retained(),
        |e| children(e),
        |e| to_element(e, None).own_text(),
    )
}

/// Writes AXValue directly. False when the element refuses it.
pub fn set_value(element: &ax::UiElement, text: &str) -> bool {
    let attr = named_attr("AXValue");
    let value = cf::String::from_str(text);
    let err = unsafe {
        AXUIElementSetAttributeValue(
            element as *const ax::UiElement as *const c_void,
            &*attr as *const cf::String as *const c_void,
            &*value as *const cf::String as *const c_void,
        )
    };
    err == AX_SUCCESS
}

pub fn press(element: &ax::UiElement) -> bool {
    element.perform_action(ax::action::press()).is_ok()
}

pub fn element_at(x: f64, y: f64) -> Option<R<ax::UiElement>> {
    let sys = ax::UiElement::sys_wide();
    sys.element_at_pos(x as f32, y as f32).ok()
}

pub fn app_element(pid: i32) -> R<ax::UiElement> {
    ax::UiElement::with_app_pid(pid)
}
