//! Test cases and where they come from

use desktester_core::{Error, Result, Step};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One test file: optional setup, the main steps, and teardown that always runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<Step>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teardown: Vec<Step>,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            setup: Vec::new(),
            steps: Vec::new(),
            teardown: Vec::new(),
        }
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_setup(mut self, steps: Vec<Step>) -> Self {
        self.setup = steps;
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_teardown(mut self, steps: Vec<Step>) -> Self {
        self.teardown = steps;
        self
    }

    /// True when `filter` is empty or shares a tag with this test.
    pub fn selected_by(&self, filter: &[String]) -> bool {
        filter.is_empty() || self.tags.iter().any(|t| filter.contains(t))
    }

    /// Rejects locators that are malformed or too deep. Missing step
    /// parameters are left to execution, where they fail the single step.
    pub fn check_locators(&self) -> Result<()> {
        for step in self.setup.iter().chain(&self.steps).chain(&self.teardown) {
            let targets = step
                .target
                .iter()
                .chain(step.assertion.as_ref().and_then(|a| a.target.as_ref()));
            for target in targets {
                target
                    .validate()
                    .map_err(|e| Error::invalid_step(&step.id, &e.message))?;
            }
        }
        Ok(())
    }
}

/// Loads test cases by path.
pub trait TestSource: Send {
    fn load(&self, path: &Path) -> Result<TestCase>;
}

/// One JSON document per test file.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTestSource;

impl JsonTestSource {
    pub fn save(&self, path: &Path, case: &TestCase) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(case)?)?;
        Ok(())
    }
}

impl TestSource for JsonTestSource {
    fn load(&self, path: &Path) -> Result<TestCase> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::from(e).with_context(serde_json::json!({"path": path.display().to_string()}))
        })?;
        let case: TestCase = serde_json::from_str(&raw)?;
        case.check_locators()?;
        tracing::debug!(path = %path.display(), test = %case.name, steps = case.steps.len(), "loaded test");
        Ok(case)
    }
}

/// `*.json` files directly under `dir`, sorted by name.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use desktester_core::{ActionType, ErrorCode, LocatorStrategy};
    use pretty_assertions::assert_eq;

    const LOGIN: &str = r#"{
        "name": "login",
        "tags": ["smoke"],
        "setup": [{"id": "s1", "action": "launch_app"}],
        "steps": [
            {"id": "step_1", "action": "click", "target": {"type": "accessibility_id", "value": "btnOK"}},
            {"id": "step_2", "action": "type_text", "text": "Hi"}
        ],
        "teardown": [{"id": "t1", "action": "close_app"}]
    }"#;

    #[test]
    fn loads_all_phases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.json");
        fs::write(&path, LOGIN).unwrap();

        let case = JsonTestSource.load(&path).unwrap();
        assert_eq!(case.name, "login");
        assert_eq!(case.setup.len(), 1);
        assert_eq!(case.steps[0].target, Some(LocatorStrategy::id("btnOK")));
        assert_eq!(case.steps[1].action, ActionType::TypeText);
        assert_eq!(case.teardown[0].action, ActionType::CloseApp);
    }

    #[test]
    fn tag_selection() {
        let case = TestCase::new("t").with_tags(["smoke", "login"]);
        assert!(case.selected_by(&[]));
        assert!(case.selected_by(&["login".to_string()]));
        assert!(!case.selected_by(&["nightly".to_string()]));
        assert!(!TestCase::new("untagged").selected_by(&["smoke".to_string()]));
    }

    #[test]
    fn deep_fallback_chain_is_rejected_at_load() {
        let mut target = LocatorStrategy::id("end");
        for i in 0..20 {
            target = LocatorStrategy::id(format!("l{}", i)).with_fallback(target);
        }
        let case = TestCase::new("deep")
            .with_steps(vec![desktester_core::Step::new("step_1", ActionType::Click).with_target(target)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.json");
        JsonTestSource.save(&path, &case).unwrap();
        let err = JsonTestSource.load(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStep);
        assert!(err.message.contains("step_1"), "{}", err.message);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = JsonTestSource.load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::Io);
        assert_eq!(err.context.unwrap()["path"], "/definitely/not/here.json");
    }

    #[test]
    fn discover_lists_json_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let names: Vec<String> = discover(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }
}
