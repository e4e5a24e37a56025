#![allow(dead_code)]

use desktester_core::virtual_desktop::{VirtualApp, VirtualNode};
use desktester_core::{AutomationEngine, Bounds, TargetApp, VirtualDesktop};
use desktester_runner::{JsonTestSource, ProjectConfig, StepExecutor, TestCase, TestRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Calculator-ish window: a display, two buttons, one disabled.
pub fn calc() -> VirtualNode {
    VirtualNode::new("window")
        .title("Calc")
        .bounds(Bounds::new(0.0, 0.0, 300.0, 400.0))
        .child(
            VirtualNode::new("text_field")
                .identifier("display")
                .label("Display")
                .bounds(Bounds::new(10.0, 10.0, 280.0, 40.0)),
        )
        .child(
            VirtualNode::new("button")
                .identifier("btnOK")
                .title("OK")
                .bounds(Bounds::new(10.0, 60.0, 80.0, 30.0)),
        )
        .child(
            VirtualNode::new("button")
                .identifier("btnClear")
                .title("Clear")
                .bounds(Bounds::new(100.0, 60.0, 80.0, 30.0))
                .disabled(),
        )
        .child(
            VirtualNode::new("group")
                .identifier("history")
                .bounds(Bounds::new(10.0, 100.0, 280.0, 200.0))
                .child(VirtualNode::new("static_text").value("1 + 1 = 2"))
                .child(VirtualNode::new("static_text").value("2 * 3 = 6"))
                .child(VirtualNode::new("static_text").value("9 - 4 = 5").hidden()),
        )
}

pub struct Project {
    pub dir: tempfile::TempDir,
    pub desktop: VirtualDesktop,
    pub engine: Arc<AutomationEngine>,
    pub config: ProjectConfig,
}

impl Project {
    pub fn new() -> Self {
        let desktop = VirtualDesktop::new().with_poll_interval(Duration::from_millis(5));
        desktop.install(VirtualApp::new("Calc").with_bundle_id("com.example.calc").with_root(calc()));
        let engine = Arc::new(AutomationEngine::new(desktop.clone()));
        let mut config = ProjectConfig::default();
        config.target_app = TargetApp::bundle("com.example.calc");
        config.settings.default_timeout = 0.1;
        config.settings.screenshot_on_failure = false;
        Self {
            dir: tempfile::tempdir().unwrap(),
            desktop,
            engine,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `case` to `tests/<file>` and returns the path.
    pub fn write(&self, file: &str, case: &TestCase) -> PathBuf {
        let tests = self.config.tests_path(self.path());
        std::fs::create_dir_all(&tests).unwrap();
        let path = tests.join(file);
        JsonTestSource.save(&path, case).unwrap();
        path
    }

    pub fn runner(&self) -> TestRunner {
        let executor = StepExecutor::new(self.engine.clone())
            .with_poll_interval(Duration::from_millis(10))
            .with_absence_timeout(Duration::from_millis(50));
        TestRunner::new(self.engine.clone(), self.path(), self.config.clone()).with_executor(executor)
    }
}
