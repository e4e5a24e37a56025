//! Steps and their results
//!
//! A `Step` is one recorded or authored unit of test action. Results are
//! produced by the runner and never mutated afterwards.

use crate::error::{Error, Result};
use crate::locator::LocatorStrategy;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    DoubleClick,
    RightClick,
    TypeText,
    KeyCombo,
    ClearField,
    LaunchApp,
    CloseApp,
    Wait,
    WaitForElement,
    WaitForElementGone,
    WaitForWindow,
    Assert,
    RunScript,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::DoubleClick => "double_click",
            ActionType::RightClick => "right_click",
            ActionType::TypeText => "type_text",
            ActionType::KeyCombo => "key_combo",
            ActionType::ClearField => "clear_field",
            ActionType::LaunchApp => "launch_app",
            ActionType::CloseApp => "close_app",
            ActionType::Wait => "wait",
            ActionType::WaitForElement => "wait_for_element",
            ActionType::WaitForElementGone => "wait_for_element_gone",
            ActionType::WaitForWindow => "wait_for_window",
            ActionType::Assert => "assert",
            ActionType::RunScript => "run_script",
        }
    }

    /// Actions that cannot run without a target locator.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            ActionType::Click
                | ActionType::DoubleClick
                | ActionType::RightClick
                | ActionType::ClearField
                | ActionType::WaitForElement
                | ActionType::WaitForElementGone
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionType {
    ElementExists,
    ElementNotExists,
    ElementText,
    ElementValue,
    ElementEnabled,
    ElementVisible,
    ElementCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    MatchesRegex,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Equals => "equals",
            ComparisonOperator::NotEquals => "not_equals",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::NotContains => "not_contains",
            ComparisonOperator::StartsWith => "starts_with",
            ComparisonOperator::EndsWith => "ends_with",
            ComparisonOperator::GreaterThan => "greater_than",
            ComparisonOperator::LessThan => "less_than",
            ComparisonOperator::MatchesRegex => "matches_regex",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionSpec {
    #[serde(rename = "type")]
    pub assertion_type: AssertionType,
    /// Falls back to the step's own target when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<LocatorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<ComparisonOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
}

impl AssertionSpec {
    pub fn new(assertion_type: AssertionType) -> Self {
        Self {
            assertion_type,
            target: None,
            operator: None,
            expected: None,
        }
    }

    pub fn with_target(mut self, target: LocatorStrategy) -> Self {
        self.target = Some(target);
        self
    }

    pub fn compare(mut self, operator: ComparisonOperator, expected: impl Into<serde_json::Value>) -> Self {
        self.operator = Some(operator);
        self.expected = Some(expected.into());
        self
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub action: ActionType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<LocatorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Seconds, for `wait`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Window title fragment, for `wait_for_window`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<AssertionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub screenshot: bool,
    /// Seconds; overrides the target locator's own timeout when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub continue_on_failure: bool,
}

impl Step {
    pub fn new(id: impl Into<String>, action: ActionType) -> Self {
        Self {
            id: id.into(),
            action,
            description: String::new(),
            target: None,
            text: None,
            keys: Vec::new(),
            duration: None,
            title: None,
            assertion: None,
            script: None,
            screenshot: false,
            timeout: None,
            continue_on_failure: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_target(mut self, target: LocatorStrategy) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_assertion(mut self, assertion: AssertionSpec) -> Self {
        self.assertion = Some(assertion);
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn with_screenshot(mut self) -> Self {
        self.screenshot = true;
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(crate::resolve::wait_secs)
    }

    /// Checks that the parameters the action needs are present.
    pub fn validate(&self) -> Result<()> {
        let missing = |what: &str| Err(Error::invalid_step(&self.id, &format!("{} requires {}", self.action, what)));
        if self.action.needs_target() && self.target.is_none() {
            return missing("a target");
        }
        match self.action {
            ActionType::TypeText if self.text.is_none() => return missing("text"),
            ActionType::KeyCombo if self.keys.is_empty() => return missing("keys"),
            ActionType::WaitForWindow if self.title.is_none() => return missing("a title"),
            ActionType::Assert if self.assertion.is_none() => return missing("an assertion"),
            ActionType::RunScript if self.script.is_none() => return missing("a script"),
            _ => {}
        }
        if let Some(target) = &self.target {
            target.validate()?;
        }
        if let Some(t) = self.timeout {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::invalid_step(&self.id, "timeout must be >= 0"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Passed)
    }
}

/// Which part of a test a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Setup,
    Main,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub phase: StepPhase,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl StepResult {
    pub fn new(step: &Step, phase: StepPhase, status: StepStatus, duration: Duration) -> Self {
        Self {
            step_id: step.id.clone(),
            description: step.description.clone(),
            phase,
            status,
            duration_ms: duration.as_millis() as u64,
            error_message: None,
            screenshot_path: None,
            actual_value: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual_value = Some(actual.into());
        self
    }

    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub test_file: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Why the test never got to run its steps (load failure, skip reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TestResult {
    /// A result with no steps, e.g. for a file that failed to load.
    pub fn without_steps(
        test_name: impl Into<String>,
        test_file: impl Into<String>,
        status: TestStatus,
        message: impl Into<String>,
    ) -> Self {
        let now = Local::now();
        Self {
            test_name: test_name.into(),
            test_file: test_file.into(),
            status,
            duration_ms: 0,
            steps: Vec::new(),
            started_at: now,
            finished_at: now,
            error_message: Some(message.into()),
        }
    }

    pub fn phase(&self, phase: StepPhase) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(move |r| r.phase == phase)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl RunSummary {
    pub fn push(&mut self, result: TestResult) {
        self.total += 1;
        match result.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Error => self.errors += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
        self.duration_ms += result.duration_ms;
        self.results.push(result);
    }

    pub fn from_results(results: impl IntoIterator<Item = TestResult>) -> Self {
        let mut summary = Self::default();
        for r in results {
            summary.push(r);
        }
        summary
    }

    pub fn all_passed(&self) -> bool {
        self.passed + self.skipped == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn step_keyed_form() {
        let step: Step = serde_json::from_value(json!({
            "id": "step_1",
            "action": "assert",
            "target": {"type": "accessibility_id", "value": "result"},
            "assertion": {"type": "element_text", "operator": "equals", "expected": "42"},
            "continue_on_failure": true
        }))
        .unwrap();
        assert_eq!(step.action, ActionType::Assert);
        assert!(step.continue_on_failure);
        let spec = step.assertion.as_ref().unwrap();
        assert_eq!(spec.operator, Some(ComparisonOperator::Equals));
        assert_eq!(spec.expected, Some(json!("42")));
        step.validate().unwrap();

        let out = serde_json::to_value(Step::new("step_2", ActionType::Wait).with_duration(0.5)).unwrap();
        assert_eq!(out, json!({"id": "step_2", "action": "wait", "duration": 0.5}));
    }

    #[test]
    fn validate_reports_missing_parameters() {
        let err = Step::new("s", ActionType::Click).validate().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidStep);
        assert!(err.message.contains("click requires a target"), "{}", err.message);

        assert!(Step::new("s", ActionType::TypeText).validate().is_err());
        assert!(Step::new("s", ActionType::TypeText).with_text("hi").validate().is_ok());
        assert!(Step::new("s", ActionType::KeyCombo).validate().is_err());
        assert!(Step::new("s", ActionType::Wait).with_timeout(-1.0).validate().is_err());
    }

    #[test]
    fn summary_counts_every_status() {
        let statuses = [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Error,
            TestStatus::Skipped,
            TestStatus::Passed,
        ];
        let summary = RunSummary::from_results(statuses.iter().enumerate().map(|(i, s)| {
            let mut r = TestResult::without_steps(format!("t{}", i), "f", *s, "");
            r.duration_ms = 10 * (i as u64 + 1);
            r
        }));
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed + summary.failed + summary.errors + summary.skipped, summary.total);
        assert_eq!(summary.duration_ms, 150);
        assert!(!summary.all_passed());
    }

    #[test]
    fn step_statuses_are_outcomes_only() {
        let passed: StepStatus = serde_json::from_value(json!("passed")).unwrap();
        assert_eq!(passed, StepStatus::Passed);
        assert!(serde_json::from_value::<StepStatus>(json!("pending")).is_err());
        assert!(serde_json::from_value::<StepStatus>(json!("running")).is_err());
    }
}
