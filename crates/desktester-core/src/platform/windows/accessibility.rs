//! Windows UI Automation wrapper

use crate::element::{collect_text, Bounds, ElementNode, NativeHandle, UIElement};
use crate::error::{Error, ErrorCode, Result};
use crate::roles::{normalize_uia_role, uia_control_type_name};
use windows::core::BSTR;
use windows::Win32::Foundation::POINT;
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_INPROC_SERVER};
use windows::Win32::UI::Accessibility::{
    CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationInvokePattern,
    IUIAutomationTreeWalker, IUIAutomationValuePattern, UIA_InvokePatternId, UIA_ValuePatternId,
};

fn uia_error(what: &str, e: windows::core::Error) -> Error {
    Error::new(ErrorCode::Unknown, format!("{}: {:?}", what, e))
}

pub struct Automation {
    inner: IUIAutomation,
}

impl Automation {
    pub fn new() -> Result<Self> {
        super::init_com()?;
        let inner: IUIAutomation = unsafe {
            CoCreateInstance(&CUIAutomation, None, CLSCTX_INPROC_SERVER)
                .map_err(|e| uia_error("Failed to create UIAutomation", e))?
        };
        Ok(Self { inner })
    }

    pub fn root(&self) -> Result<Element> {
        let root = unsafe { self.inner.GetRootElement() }.map_err(|e| uia_error("Failed to get root", e))?;
        Ok(Element { inner: root })
    }

    pub fn focused(&self) -> Option<Element> {
        unsafe { self.inner.GetFocusedElement() }
            .ok()
            .map(|inner| Element { inner })
    }

    pub fn element_at(&self, x: i32, y: i32) -> Option<Element> {
        unsafe { self.inner.ElementFromPoint(POINT { x, y }) }
            .ok()
            .map(|inner| Element { inner })
    }

    pub fn walker(&self) -> Result<TreeWalker> {
        let inner = unsafe { self.inner.ControlViewWalker() }
            .map_err(|e| uia_error("Failed to get tree walker", e))?;
        Ok(TreeWalker { inner })
    }

    /// Top-level windows owned by `pid`.
    pub fn windows_of(&self, pid: i32) -> Result<Vec<Element>> {
        let root = self.root()?;
        let walker = self.walker()?;
        Ok(walker
            .children(&root)
            .into_iter()
            .filter(|w| w.process_id() == pid)
            .collect())
    }

    /// Pids owning at least one top-level window.
    pub fn windowed_pids(&self) -> Result<Vec<i32>> {
        let root = self.root()?;
        let walker = self.walker()?;
        let mut pids: Vec<i32> = walker.children(&root).iter().map(Element::process_id).collect();
        pids.sort_unstable();
        pids.dedup();
        Ok(pids)
    }
}

#[derive(Clone)]
pub struct Element {
    inner: IUIAutomationElement,
}

impl Element {
    pub fn name(&self) -> Option<String> {
        unsafe { self.inner.CurrentName() }
            .ok()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn automation_id(&self) -> Option<String> {
        unsafe { self.inner.CurrentAutomationId() }
            .ok()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn help_text(&self) -> Option<String> {
        unsafe { self.inner.CurrentHelpText() }
            .ok()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn control_type(&self) -> i32 {
        unsafe { self.inner.CurrentControlType() }.map(|ct| ct.0).unwrap_or(0)
    }

    pub fn role(&self) -> String {
        normalize_uia_role(uia_control_type_name(self.control_type()))
    }

    pub fn bounds(&self) -> Bounds {
        unsafe { self.inner.CurrentBoundingRectangle() }
            .map(|r| {
                Bounds::new(
                    r.left as f64,
                    r.top as f64,
                    (r.right - r.left) as f64,
                    (r.bottom - r.top) as f64,
                )
            })
            .unwrap_or_default()
    }

    pub fn process_id(&self) -> i32 {
        unsafe { self.inner.CurrentProcessId() }.unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        unsafe { self.inner.CurrentIsEnabled() }
            .map(|b| b.as_bool())
            .unwrap_or(false)
    }

    pub fn is_offscreen(&self) -> bool {
        unsafe { self.inner.CurrentIsOffscreen() }
            .map(|b| b.as_bool())
            .unwrap_or(true)
    }

    fn value_pattern(&self) -> Option<IUIAutomationValuePattern> {
        unsafe { self.inner.GetCurrentPatternAs::<IUIAutomationValuePattern>(UIA_ValuePatternId) }.ok()
    }

    pub fn value(&self) -> Option<String> {
        let pattern = self.value_pattern()?;
        unsafe { pattern.CurrentValue() }.ok().map(|s| s.to_string())
    }

    /// Writes through the Value pattern. False when the element has none or
    /// refuses.
    pub fn set_value(&self, text: &str) -> bool {
        match self.value_pattern() {
            Some(pattern) => unsafe { pattern.SetValue(&BSTR::from(text)) }.is_ok(),
            None => false,
        }
    }

    /// Native activation through the Invoke pattern.
    pub fn invoke(&self) -> bool {
        unsafe { self.inner.GetCurrentPatternAs::<IUIAutomationInvokePattern>(UIA_InvokePatternId) }
            .and_then(|p| unsafe { p.Invoke() })
            .is_ok()
    }

    pub fn focus(&self) -> bool {
        unsafe { self.inner.SetFocus() }.is_ok()
    }

    pub fn snapshot(&self, path: Option<String>) -> UIElement {
        let bounds = self.bounds();
        let mut el = UIElement::new(self.role())
            .with_bounds(bounds)
            .with_handle(NativeHandle::new(self.clone()));
        el.title = self.name();
        el.label = self.help_text();
        el.value = self.value();
        el.identifier = self.automation_id();
        el.enabled = self.is_enabled();
        el.visible = !self.is_offscreen() && bounds.width > 0.0 && bounds.height > 0.0;
        el.path = path;
        el
    }
}

pub struct TreeWalker {
    inner: IUIAutomationTreeWalker,
}

impl TreeWalker {
    fn first_child(&self, element: &Element) -> Option<Element> {
        unsafe { self.inner.GetFirstChildElement(&element.inner) }
            .ok()
            .map(|inner| Element { inner })
    }

    fn next_sibling(&self, element: &Element) -> Option<Element> {
        unsafe { self.inner.GetNextSiblingElement(&element.inner) }
            .ok()
            .map(|inner| Element { inner })
    }

    pub fn children(&self, element: &Element) -> Vec<Element> {
        let mut out = Vec::new();
        let mut current = self.first_child(element);
        while let Some(child) = current {
            current = self.next_sibling(&child);
            out.push(child);
        }
        out
    }

    /// Pre-order walk from each root, paths rooted at `{role}[i]`.
    pub fn walk(&self, roots: &[Element], max_depth: usize) -> Vec<UIElement> {
        let mut out = Vec::new();
        for (i, root) in roots.iter().enumerate() {
            let path = format!("{}[{}]", root.role(), i);
            self.walk_recursive(root, path, 0, max_depth, &mut out);
        }
        out
    }

    fn walk_recursive(&self, element: &Element, path: String, depth: usize, max_depth: usize, out: &mut Vec<UIElement>) {
        if depth > max_depth {
            return;
        }
        out.push(element.snapshot(Some(path.clone())));
        for (i, child) in self.children(element).iter().enumerate() {
            let child_path = format!("{}/{}[{}]", path, child.role(), i);
            self.walk_recursive(child, child_path, depth + 1, max_depth, out);
        }
    }

    pub fn tree(&self, element: &Element, path: String, depth: usize, max_depth: usize) -> ElementNode {
        let mut node = ElementNode {
            element: element.snapshot(Some(path.clone())),
            children: Vec::new(),
        };
        if depth < max_depth {
            for (i, child) in self.children(element).iter().enumerate() {
                let child_path = format!("{}/{}[{}]", path, child.role(), i);
                node.children.push(self.tree(child, child_path, depth + 1, max_depth));
            }
        }
        node
    }

    pub fn text(&self, element: &Element) -> String {
        collect_text(element, |e| self.children(e), |e| e.snapshot(None).own_text())
    }
}
