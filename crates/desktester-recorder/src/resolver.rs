//! Element Resolver - screen point to element to replayable locator

use desktester_core::{AutomationEngine, LocatorStrategy, UIElement};
use std::sync::Arc;

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Coordinate link at the element's center, or at `point` when the element
/// reports no usable bounds.
fn coordinate(element: &UIElement, point: (f64, f64)) -> LocatorStrategy {
    let (x, y) = if element.bounds.width > 0.0 && element.bounds.height > 0.0 {
        element.center()
    } else {
        point
    };
    LocatorStrategy::point(x, y)
}

/// Semantic tiers in priority order: role+title, role+label, role+value.
fn semantic(element: &UIElement) -> Option<LocatorStrategy> {
    let role = Some(element.role.as_str()).filter(|r| !r.is_empty());
    if let Some(title) = non_empty(&element.title) {
        return Some(LocatorStrategy::role_title(role, title));
    }
    if let Some(label) = non_empty(&element.label) {
        return Some(LocatorStrategy::role_label(role, label));
    }
    // role+title matching also compares the value field
    non_empty(&element.value).map(|value| LocatorStrategy::role_title(role, value))
}

/// Best locator for `element`, strongest first:
/// accessibility id, role+title, role+label, role+value, coordinate.
///
/// Every semantic link falls back one tier down, and every chain ends in a
/// coordinate link, so an id locator carries up to three links.
pub fn best_locator(element: &UIElement, point: (f64, f64)) -> LocatorStrategy {
    let coord = coordinate(element, point);
    let semantic = semantic(element).map(|s| s.with_fallback(coord.clone()));

    match non_empty(&element.identifier) {
        Some(id) => LocatorStrategy::id(id).with_fallback(semantic.unwrap_or(coord)),
        None => semantic.unwrap_or(coord),
    }
}

pub struct ElementResolver {
    engine: Arc<AutomationEngine>,
}

impl ElementResolver {
    pub fn new(engine: Arc<AutomationEngine>) -> Self {
        Self { engine }
    }

    /// Element at a screen point and its best locator. Backend errors are
    /// logged and treated as "nothing there".
    pub fn resolve(&self, x: f64, y: f64) -> Option<(UIElement, LocatorStrategy)> {
        match self.engine.element_at_point(x, y) {
            Ok(Some(element)) => {
                let locator = best_locator(&element, (x, y));
                Some((element, locator))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(x, y, error = %e, "element lookup failed");
                None
            }
        }
    }

    /// Keyboard focus, for key events. Backends without focus queries yield
    /// `None`.
    pub fn resolve_focused(&self) -> Option<(UIElement, LocatorStrategy)> {
        match self.engine.focused_element() {
            Ok(Some(element)) => {
                let locator = best_locator(&element, element.center());
                Some((element, locator))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "focus query failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desktester_core::{Bounds, LocatorType};
    use pretty_assertions::assert_eq;

    fn button() -> UIElement {
        UIElement::new("button").with_bounds(Bounds::new(10.0, 10.0, 20.0, 10.0))
    }

    fn types(loc: &LocatorStrategy) -> Vec<LocatorType> {
        loc.chain().map(|l| l.locator_type).collect()
    }

    #[test]
    fn identifier_chain_has_three_links() {
        let el = button().with_identifier("btnOK").with_title("OK");
        let loc = best_locator(&el, (0.0, 0.0));
        assert_eq!(
            types(&loc),
            vec![LocatorType::AccessibilityId, LocatorType::RoleTitle, LocatorType::Coordinate]
        );
        assert_eq!(loc.value, "btnOK");
        let second = loc.fallback.as_deref().unwrap();
        assert_eq!(second.role.as_deref(), Some("button"));
        assert_eq!(second.value, "OK");
        assert_eq!(second.fallback.as_deref().unwrap().value, "20,15");
    }

    #[test]
    fn identifier_without_names_falls_back_to_coordinate() {
        let loc = best_locator(&button().with_identifier("x"), (0.0, 0.0));
        assert_eq!(types(&loc), vec![LocatorType::AccessibilityId, LocatorType::Coordinate]);
    }

    #[test]
    fn tiers_in_priority_order() {
        let label = best_locator(&button().with_label("Close"), (0.0, 0.0));
        assert_eq!(types(&label), vec![LocatorType::RoleLabel, LocatorType::Coordinate]);

        let value = best_locator(&UIElement::new("text_field").with_value("hello"), (0.0, 0.0));
        assert_eq!(types(&value), vec![LocatorType::RoleTitle, LocatorType::Coordinate]);
        assert_eq!(value.value, "hello");

        let title_wins = best_locator(&button().with_title("OK").with_label("Confirm"), (0.0, 0.0));
        assert_eq!(title_wins.value, "OK");
    }

    #[test]
    fn blank_fields_are_ignored() {
        let el = button().with_identifier("  ").with_title("");
        let loc = best_locator(&el, (0.0, 0.0));
        assert_eq!(types(&loc), vec![LocatorType::Coordinate]);
    }

    #[test]
    fn coordinate_uses_event_point_without_bounds() {
        let loc = best_locator(&UIElement::new("group"), (42.4, 7.6));
        assert_eq!(loc.value, "42,8");
    }

    #[test]
    fn chains_validate() {
        let el = button().with_identifier("btnOK").with_title("OK");
        assert!(best_locator(&el, (0.0, 0.0)).validate().is_ok());
    }
}
