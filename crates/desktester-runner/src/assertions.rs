//! Assertion evaluation
//!
//! A mismatch between expected and actual is an [`AssertionError::Mismatch`]
//! or [`AssertionError::Unmet`] and fails the step. Anything else that goes
//! wrong while evaluating (no target, a bad regex, the app went away) is an
//! evaluation error, so authoring mistakes don't read as product failures.

use crate::resolve::{effective_locator, with_link_timeouts};
use desktester_core::{
    AssertionType, AutomationEngine, ComparisonOperator, Error, ErrorCode, LocatorStrategy, Step, StepStatus,
};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Per-link timeout for `element_not_exists`, independent of the step timeout.
pub const ABSENCE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum AssertionError {
    #[error("Assertion failed: {field} {operator} expected '{expected}', got '{actual}'")]
    Mismatch {
        field: &'static str,
        operator: ComparisonOperator,
        expected: String,
        actual: String,
    },
    #[error("{message}")]
    Unmet { message: String, actual: Option<String> },
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{}", .0.message)]
    Evaluation(#[from] Error),
}

impl AssertionError {
    pub fn status(&self) -> StepStatus {
        match self {
            AssertionError::Mismatch { .. } | AssertionError::Unmet { .. } => StepStatus::Failed,
            AssertionError::Pattern { .. } | AssertionError::Evaluation(_) => StepStatus::Error,
        }
    }

    pub fn actual(&self) -> Option<&str> {
        match self {
            AssertionError::Mismatch { actual, .. } => Some(actual),
            AssertionError::Unmet { actual, .. } => actual.as_deref(),
            _ => None,
        }
    }

    fn unmet(message: impl Into<String>) -> Self {
        AssertionError::Unmet {
            message: message.into(),
            actual: None,
        }
    }

    /// The same failure in the crate-wide error shape.
    pub fn to_error(&self) -> Error {
        match self {
            AssertionError::Mismatch {
                field,
                operator,
                expected,
                actual,
            } => Error::assertion_failed(field, operator.as_str(), expected.clone(), actual.clone()),
            AssertionError::Unmet { message, .. } => Error::new(ErrorCode::AssertionFailed, message.clone()),
            AssertionError::Pattern { .. } => Error::new(ErrorCode::InvalidStep, self.to_string()),
            AssertionError::Evaluation(e) => e.clone(),
        }
    }
}

type Outcome = std::result::Result<Option<String>, AssertionError>;

/// Applies `operator` to `actual` (left) and `expected` (right).
///
/// `greater_than` and `less_than` compare numerically when both sides parse
/// as numbers and lexicographically otherwise. `matches_regex` searches
/// anywhere in `actual`.
pub fn compare(actual: &str, expected: &str, operator: ComparisonOperator) -> Result<bool, regex::Error> {
    let numbers = || Some((actual.trim().parse::<f64>().ok()?, expected.trim().parse::<f64>().ok()?));
    Ok(match operator {
        ComparisonOperator::Equals => actual == expected,
        ComparisonOperator::NotEquals => actual != expected,
        ComparisonOperator::Contains => actual.contains(expected),
        ComparisonOperator::NotContains => !actual.contains(expected),
        ComparisonOperator::StartsWith => actual.starts_with(expected),
        ComparisonOperator::EndsWith => actual.ends_with(expected),
        ComparisonOperator::GreaterThan => match numbers() {
            Some((a, e)) => a > e,
            None => actual > expected,
        },
        ComparisonOperator::LessThan => match numbers() {
            Some((a, e)) => a < e,
            None => actual < expected,
        },
        ComparisonOperator::MatchesRegex => Regex::new(expected)?.is_match(actual),
    })
}

/// Expected values are authored as JSON; strings compare verbatim, other
/// scalars by their JSON text.
fn expected_text(expected: Option<&Value>) -> String {
    match expected {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn expected_flag(step: &Step, expected: Option<&Value>) -> Result<bool, AssertionError> {
    match expected {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(Error::invalid_step(&step.id, &format!("expected must be a boolean, got {}", other)).into()),
    }
}

fn expected_count(step: &Step, expected: Option<&Value>) -> Result<u64, AssertionError> {
    let count = match expected {
        None | Some(Value::Null) => Some(0),
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    count.ok_or_else(|| Error::invalid_step(&step.id, "expected must be a non-negative integer").into())
}

pub struct AssertionEvaluator {
    engine: Arc<AutomationEngine>,
    absence_timeout: Duration,
}

impl AssertionEvaluator {
    pub fn new(engine: Arc<AutomationEngine>) -> Self {
        Self {
            engine,
            absence_timeout: ABSENCE_TIMEOUT,
        }
    }

    pub fn with_absence_timeout(mut self, timeout: Duration) -> Self {
        self.absence_timeout = timeout;
        self
    }

    /// Evaluates an `assert` step. `Ok` carries the observed value for kinds
    /// that read one.
    pub fn check(&self, step: &Step, default_timeout: f64) -> Outcome {
        let spec = step
            .assertion
            .as_ref()
            .ok_or_else(|| Error::invalid_step(&step.id, "assert requires an assertion"))?;
        // The step's own target wins over one nested in the assertion.
        let target = step
            .target
            .as_ref()
            .or(spec.target.as_ref())
            .ok_or_else(|| Error::invalid_step(&step.id, "assertion has no target"))?;
        let locator = effective_locator(target, step.timeout, default_timeout);
        let operator = spec.operator.unwrap_or(ComparisonOperator::Equals);
        let expected = spec.expected.as_ref();

        tracing::debug!(step = %step.id, kind = ?spec.assertion_type, locator = %locator, "evaluating assertion");
        match spec.assertion_type {
            AssertionType::ElementExists => self.exists(&locator),
            AssertionType::ElementNotExists => self.not_exists(&locator),
            AssertionType::ElementText => {
                let element = self.engine.find_element(&locator)?;
                let actual = self.engine.element_text(&element)?;
                matched("text", actual, &expected_text(expected), operator)
            }
            AssertionType::ElementValue => {
                let element = self.engine.find_element(&locator)?;
                let actual = match element.value.clone() {
                    Some(value) => value,
                    None => self.engine.element_text(&element)?,
                };
                matched("value", actual, &expected_text(expected), operator)
            }
            AssertionType::ElementEnabled => {
                let want = expected_flag(step, expected)?;
                let element = self.engine.find_element(&locator)?;
                flag("enabled", element.enabled, want)
            }
            AssertionType::ElementVisible => {
                let want = expected_flag(step, expected)?;
                let element = self.engine.find_element(&locator)?;
                flag("visible", element.visible, want)
            }
            AssertionType::ElementCount => {
                let want = expected_count(step, expected)?;
                let actual = self.engine.find_elements(&locator)?.len();
                matched("count", actual.to_string(), &want.to_string(), operator)
            }
        }
    }

    fn exists(&self, locator: &LocatorStrategy) -> Outcome {
        match self.engine.find_element(locator) {
            Ok(_) => Ok(None),
            Err(e) if e.code == ErrorCode::ElementNotFound => {
                Err(AssertionError::unmet("Expected element to exist, but it was not found"))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn not_exists(&self, locator: &LocatorStrategy) -> Outcome {
        let quick = with_link_timeouts(locator, self.absence_timeout.as_secs_f64());
        match self.engine.find_element(&quick) {
            Ok(_) => Err(AssertionError::unmet("Expected element to not exist, but it was found")),
            Err(e) if e.code == ErrorCode::ElementNotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn matched(field: &'static str, actual: String, expected: &str, operator: ComparisonOperator) -> Outcome {
    let passed = compare(&actual, expected, operator).map_err(|source| AssertionError::Pattern {
        pattern: expected.to_string(),
        source,
    })?;
    if passed {
        Ok(Some(actual))
    } else {
        Err(AssertionError::Mismatch {
            field,
            operator,
            expected: expected.to_string(),
            actual,
        })
    }
}

fn flag(field: &str, actual: bool, expected: bool) -> Outcome {
    if actual == expected {
        Ok(Some(actual.to_string()))
    } else {
        Err(AssertionError::Unmet {
            message: format!("Expected {}={}, got {}={}", field, expected, field, actual),
            actual: Some(actual.to_string()),
        })
    }
}
