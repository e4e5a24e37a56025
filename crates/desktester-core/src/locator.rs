//! Locator strategies
//!
//! A locator says how to find one element and, optionally, what to try next
//! when that fails. The fallback chain is owned (`Box`), so it is finite and
//! acyclic by construction; its length is additionally capped when parsed.

use crate::element::UIElement;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;

/// Longest fallback chain accepted from external input.
pub const MAX_CHAIN_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorType {
    AccessibilityId,
    RoleTitle,
    RoleLabel,
    Path,
    TextContent,
    Coordinate,
}

impl LocatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorType::AccessibilityId => "accessibility_id",
            LocatorType::RoleTitle => "role_title",
            LocatorType::RoleLabel => "role_label",
            LocatorType::Path => "path",
            LocatorType::TextContent => "text_content",
            LocatorType::Coordinate => "coordinate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    #[serde(rename = "type")]
    pub locator_type: LocatorType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Seconds this link may poll before the fallback takes over.
    #[serde(default = "default_timeout", skip_serializing_if = "is_default_timeout")]
    pub timeout: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Box<LocatorStrategy>>,
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

fn is_default_timeout(t: &f64) -> bool {
    (*t - DEFAULT_TIMEOUT_SECS).abs() < f64::EPSILON
}

impl LocatorStrategy {
    pub fn new(locator_type: LocatorType, value: impl Into<String>) -> Self {
        Self {
            locator_type,
            value: value.into(),
            role: None,
            index: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            fallback: None,
        }
    }

    pub fn id(identifier: impl Into<String>) -> Self {
        Self::new(LocatorType::AccessibilityId, identifier)
    }

    pub fn role_title(role: Option<&str>, title: impl Into<String>) -> Self {
        let mut loc = Self::new(LocatorType::RoleTitle, title);
        loc.role = role.map(str::to_string);
        loc
    }

    pub fn role_label(role: Option<&str>, label: impl Into<String>) -> Self {
        let mut loc = Self::new(LocatorType::RoleLabel, label);
        loc.role = role.map(str::to_string);
        loc
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(LocatorType::TextContent, text)
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::new(LocatorType::Path, path)
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(
            LocatorType::Coordinate,
            format!("{},{}", x.round() as i64, y.round() as i64),
        )
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn with_fallback(mut self, fallback: LocatorStrategy) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        crate::resolve::wait_secs(self.timeout)
    }

    /// Iterates the chain starting at `self`.
    pub fn chain(&self) -> impl Iterator<Item = &LocatorStrategy> {
        std::iter::successors(Some(self), |l| l.fallback.as_deref())
    }

    /// Sum of every link's timeout: the worst-case resolution time.
    pub fn total_timeout(&self) -> Duration {
        self.chain().map(|l| l.timeout_duration()).sum()
    }

    /// Parse the keyed form, rejecting over-long chains and malformed values.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let loc: LocatorStrategy = serde_json::from_value(value)
            .map_err(|e| Error::invalid_locator("<json>", &e.to_string()))?;
        loc.validate()?;
        Ok(loc)
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn validate(&self) -> Result<()> {
        for (depth, link) in self.chain().enumerate() {
            if depth >= MAX_CHAIN_LEN {
                return Err(Error::invalid_locator(
                    &self.to_string(),
                    &format!("fallback chain longer than {} links", MAX_CHAIN_LEN),
                ));
            }
            if !link.timeout.is_finite() || link.timeout < 0.0 {
                return Err(Error::invalid_locator(&link.to_string(), "timeout must be >= 0"));
            }
            if link.locator_type == LocatorType::Coordinate && link.point_value().is_none() {
                return Err(Error::invalid_locator(&link.to_string(), "expected 'x,y'"));
            }
        }
        Ok(())
    }

    /// `(x, y)` for coordinate locators.
    pub fn point_value(&self) -> Option<(f64, f64)> {
        let (x, y) = self.value.split_once(',')?;
        Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
    }

    pub fn matches(&self, element: &UIElement) -> bool {
        let fields = [
            element.title.as_deref(),
            element.value.as_deref(),
            element.label.as_deref(),
        ];
        match self.locator_type {
            LocatorType::AccessibilityId => element.identifier.as_deref() == Some(self.value.as_str()),
            LocatorType::RoleTitle => {
                self.role_matches(element)
                    && fields.iter().flatten().any(|f| *f == self.value)
            }
            LocatorType::RoleLabel => {
                self.role_matches(element) && element.label.as_deref() == Some(self.value.as_str())
            }
            LocatorType::TextContent => fields.iter().flatten().any(|f| f.contains(&self.value)),
            LocatorType::Path => element.path.as_deref() == Some(self.value.as_str()),
            LocatorType::Coordinate => match self.point_value() {
                Some((x, y)) => element.bounds.contains(x, y),
                None => false,
            },
        }
    }

    fn role_matches(&self, element: &UIElement) -> bool {
        match self.role.as_deref() {
            None => true,
            Some(role) => {
                element.role == role || crate::roles::normalize_mac_role(role) == element.role
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Bounds;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_without_defaults() {
        let loc = LocatorStrategy::id("btnOK")
            .with_fallback(LocatorStrategy::role_title(Some("button"), "OK").with_timeout(2.0));
        let value = loc.to_value();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "accessibility_id",
                "value": "btnOK",
                "fallback": {"type": "role_title", "value": "OK", "role": "button", "timeout": 2.0}
            })
        );
        let back = LocatorStrategy::from_value(value).unwrap();
        assert_eq!(back, loc);
        assert_eq!(back.timeout, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn rejects_long_chains() {
        let mut loc = LocatorStrategy::id("a");
        for i in 0..MAX_CHAIN_LEN {
            loc = LocatorStrategy::id(format!("a{}", i)).with_fallback(loc);
        }
        let err = LocatorStrategy::from_value(loc.to_value()).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InvalidLocator);
    }

    #[test]
    fn rejects_bad_coordinates() {
        let loc = LocatorStrategy::new(LocatorType::Coordinate, "12;40");
        assert!(loc.validate().is_err());
        assert_eq!(LocatorStrategy::point(10.4, 20.6).value, "10,21");
    }

    #[test]
    fn total_timeout_sums_links() {
        let loc = LocatorStrategy::id("a")
            .with_timeout(1.0)
            .with_fallback(LocatorStrategy::id("b").with_timeout(0.5));
        assert_eq!(loc.total_timeout(), Duration::from_millis(1500));
        assert_eq!(loc.chain().count(), 2);
    }

    fn button() -> UIElement {
        UIElement::new("button")
            .with_title("Save")
            .with_label("Save document")
            .with_identifier("btnSave")
            .with_bounds(Bounds::new(100.0, 100.0, 80.0, 20.0))
            .with_path("window[0]/button[2]")
    }

    #[test]
    fn matching_rules() {
        let el = button();
        assert!(LocatorStrategy::id("btnSave").matches(&el));
        assert!(!LocatorStrategy::id("btn").matches(&el));
        assert!(LocatorStrategy::role_title(Some("button"), "Save").matches(&el));
        assert!(LocatorStrategy::role_title(None, "Save document").matches(&el));
        assert!(LocatorStrategy::role_title(Some("AXButton"), "Save").matches(&el));
        assert!(!LocatorStrategy::role_title(Some("checkbox"), "Save").matches(&el));
        assert!(LocatorStrategy::role_label(Some("button"), "Save document").matches(&el));
        assert!(!LocatorStrategy::role_label(Some("button"), "Save").matches(&el));
        assert!(LocatorStrategy::text("docu").matches(&el));
        assert!(LocatorStrategy::path("window[0]/button[2]").matches(&el));
        assert!(LocatorStrategy::point(140.0, 110.0).matches(&el));
        assert!(!LocatorStrategy::point(10.0, 10.0).matches(&el));
    }
}
