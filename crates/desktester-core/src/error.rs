//! Structured errors shared by every layer
//!
//! Each error carries a machine-readable code, a message, optional remediation
//! hints and a JSON context blob that report writers can embed verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ElementNotFound,
    ApplicationNotFound,
    NotConnected,
    PermissionDenied,
    PlatformNotSupported,
    AssertionFailed,
    Timeout,
    InvalidLocator,
    InvalidStep,
    ActionFailed,
    ScriptFailed,
    Io,
    Unknown,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Resolution gave up. `locator` is the serialized form of the locator the
    /// caller asked for, not the last fallback tried.
    pub fn element_not_found(locator: serde_json::Value, timeout_secs: f64) -> Self {
        let summary = match (locator.get("type"), locator.get("value")) {
            (Some(t), Some(v)) => format!(
                "{}={}",
                t.as_str().unwrap_or_default(),
                v.as_str().unwrap_or_default()
            ),
            _ => locator.to_string(),
        };
        Self::new(
            ErrorCode::ElementNotFound,
            format!("Element not found: {} (timeout {}s)", summary, timeout_secs),
        )
        .with_suggestions(vec![
            "Check that the target window is frontmost and not minimized".to_string(),
            "Add a fallback locator or raise the step timeout".to_string(),
        ])
        .with_context(serde_json::json!({
            "locator": locator,
            "timeout": timeout_secs,
        }))
    }

    pub fn application_not_found(identifier: &str) -> Self {
        Self::new(
            ErrorCode::ApplicationNotFound,
            format!("Application not found: {}", identifier),
        )
    }

    pub fn not_connected() -> Self {
        Self::new(ErrorCode::NotConnected, "Not connected to any application").with_suggestions(
            vec!["Launch or attach to the target application first".to_string()],
        )
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn platform_not_supported(platform: &str) -> Self {
        Self::new(
            ErrorCode::PlatformNotSupported,
            format!("Platform not supported: {}", platform),
        )
    }

    pub fn assertion_failed(
        field: &str,
        operator: &str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        let actual = actual.into();
        Self::new(
            ErrorCode::AssertionFailed,
            format!(
                "Assertion failed: {} {} expected '{}', got '{}'",
                field, operator, expected, actual
            ),
        )
        .with_context(serde_json::json!({
            "expected": expected,
            "actual": actual,
        }))
    }

    pub fn timeout(what: &str, timeout_secs: f64) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Timed out after {}s waiting for {}", timeout_secs, what),
        )
    }

    pub fn invalid_locator(locator: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidLocator,
            format!("Invalid locator '{}': {}", locator, reason),
        )
    }

    pub fn invalid_step(step_id: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidStep,
            format!("Step '{}' is invalid: {}", step_id, reason),
        )
    }

    pub fn action_failed(action: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::ActionFailed,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn script_failed(line: usize, reason: &str) -> Self {
        Self::new(
            ErrorCode::ScriptFailed,
            format!("Script line {}: {}", line, reason),
        )
    }

    /// Permission and platform errors must reach the caller untouched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::PermissionDenied | ErrorCode::PlatformNotSupported
        )
    }

    pub fn expected(&self) -> Option<&str> {
        self.context_str("expected")
    }

    pub fn actual(&self) -> Option<&str> {
        self.context_str("actual")
    }

    fn context_str(&self, key: &str) -> Option<&str> {
        self.context.as_ref()?.get(key)?.as_str()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<Error>() {
            Ok(inner) => inner,
            Err(e) => Self::new(ErrorCode::Unknown, format!("{:#}", e)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::InvalidStep, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_not_found_keeps_locator_and_timeout() {
        let err = Error::element_not_found(
            serde_json::json!({"type": "accessibility_id", "value": "btnOK"}),
            2.5,
        );
        assert_eq!(err.code, ErrorCode::ElementNotFound);
        assert!(err.message.contains("accessibility_id=btnOK"));
        let ctx = err.context.unwrap();
        assert_eq!(ctx["timeout"], 2.5);
        assert_eq!(ctx["locator"]["value"], "btnOK");
    }

    #[test]
    fn assertion_failed_exposes_expected_and_actual() {
        let err = Error::assertion_failed("text", "equals", "Hi", "Ho");
        assert_eq!(err.message, "Assertion failed: text equals expected 'Hi', got 'Ho'");
        assert_eq!(err.expected(), Some("Hi"));
        assert_eq!(err.actual(), Some("Ho"));
    }

    #[test]
    fn anyhow_roundtrip_preserves_code() {
        let original = Error::permission_denied("no trust");
        let wrapped: anyhow::Error = original.into();
        let back = Error::from(wrapped);
        assert_eq!(back.code, ErrorCode::PermissionDenied);
        assert!(back.is_fatal());
    }

    #[test]
    fn display_includes_code() {
        let err = Error::not_connected();
        assert_eq!(err.to_string(), "[NotConnected] Not connected to any application");
    }
}
