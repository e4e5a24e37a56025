//! Test Runner - setup, main and teardown phases for each test file
//!
//! Per test:
//! 1. reconnect to the target app if a previous test closed it
//! 2. setup steps in order; the first failure ends the test as `error`
//! 3. main steps in order; a failure stops the phase and fails the test
//!    unless the step has `continue_on_failure`
//! 4. teardown steps, always, best effort
//!
//! Abort is cooperative: it is checked before each setup and main step and
//! before each test file. Teardown still runs for the test that was aborted.

use crate::config::ProjectConfig;
use crate::context::RunContext;
use crate::events::RunEvent;
use crate::executor::StepExecutor;
use crate::hooks::RunHooks;
use crate::script::ScriptHost;
use crate::testcase::{self, JsonTestSource, TestSource};
use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use desktester_core::{
    AutomationEngine, Error, ErrorCode, Result, RunSummary, Step, StepPhase, StepResult, StepStatus, TestResult,
    TestStatus,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shared flag that asks a run to stop at the next step boundary.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TestRunner {
    engine: Arc<AutomationEngine>,
    project_dir: PathBuf,
    config: ProjectConfig,
    executor: StepExecutor,
    hooks: RunHooks,
    source: Box<dyn TestSource>,
    tags: Vec<String>,
    abort: AbortHandle,
    observers: Vec<Sender<RunEvent>>,
}

impl TestRunner {
    pub fn new(engine: Arc<AutomationEngine>, project_dir: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            executor: StepExecutor::new(engine.clone()),
            engine,
            project_dir: project_dir.into(),
            config,
            hooks: RunHooks::new(),
            source: Box::new(JsonTestSource),
            tags: Vec::new(),
            abort: AbortHandle::default(),
            observers: Vec::new(),
        }
    }

    /// Runner for the project at `dir`, reading `project.json` if present.
    pub fn for_project(engine: Arc<AutomationEngine>, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let config = ProjectConfig::load_dir(&dir)?;
        Ok(Self::new(engine, dir, config))
    }

    pub fn with_source(mut self, source: impl TestSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Only tests sharing at least one of `tags` run; the rest are `skipped`.
    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_script_host(mut self, host: impl ScriptHost + 'static) -> Self {
        self.executor = self.executor.with_script_host(host);
        self
    }

    /// Replace the step executor, e.g. one with shorter wait polls.
    pub fn with_executor(mut self, executor: StepExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn engine(&self) -> &Arc<AutomationEngine> {
        &self.engine
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn hooks_mut(&mut self) -> &mut RunHooks {
        &mut self.hooks
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) {
        tracing::info!("abort requested");
        self.abort.abort();
    }

    /// A new observer channel. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> Receiver<RunEvent> {
        let (tx, rx) = unbounded();
        self.observers.push(tx);
        rx
    }

    fn emit(&mut self, event: RunEvent) {
        tracing::debug!(event = event.kind(), "run event");
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    pub fn run_test(&mut self, path: &Path) -> TestResult {
        self.abort.reset();
        self.run_one(path)
    }

    /// Runs `paths` one after another.
    pub fn run_all(&mut self, paths: &[PathBuf]) -> RunSummary {
        self.abort.reset();
        self.run_many(paths)
    }

    /// Every `*.json` under the project's tests directory.
    pub fn run_project(&mut self) -> Result<RunSummary> {
        let paths = testcase::discover(&self.config.tests_path(&self.project_dir))?;
        Ok(self.run_all(&paths))
    }

    /// Runs `paths` on a worker thread. Events arrive on the handle's channel
    /// as they happen; the summary comes back from [`RunHandle::wait`].
    pub fn spawn(mut self, paths: Vec<PathBuf>) -> Result<RunHandle> {
        let events = self.subscribe();
        let abort = self.abort.clone();
        abort.reset();
        let join = std::thread::Builder::new()
            .name("desktester-runner".to_string())
            .spawn(move || self.run_many(&paths))?;
        Ok(RunHandle { events, abort, join })
    }

    fn run_many(&mut self, paths: &[PathBuf]) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        for (i, path) in paths.iter().enumerate() {
            if self.aborted() {
                tracing::info!(remaining = paths.len() - i, "run aborted");
                break;
            }
            if i > 0 {
                self.pause();
            }
            summary.push(self.run_one(path));
        }
        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            errors = summary.errors,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        self.emit(RunEvent::RunCompleted(summary.clone()));
        summary
    }

    fn run_one(&mut self, path: &Path) -> TestResult {
        let file = path.display().to_string();
        let case = match self.source.load(path) {
            Ok(case) => case,
            Err(e) => {
                tracing::warn!(path = %file, error = %e, "could not load test");
                return self.finish(TestResult::without_steps(stem(path), file, TestStatus::Error, e.message));
            }
        };
        if !case.selected_by(&self.tags) {
            tracing::info!(test = %case.name, "skipped by tag filter");
            let reason = format!("no tag in [{}]", self.tags.join(", "));
            return self.finish(TestResult::without_steps(case.name, file, TestStatus::Skipped, reason));
        }

        self.ensure_connected();
        tracing::info!(test = %case.name, path = %file, "test started");
        self.emit(RunEvent::TestStarted {
            name: case.name.clone(),
            path: file.clone(),
        });
        self.hooks.emit_before_test(&case.name);

        let ctx = RunContext::new(&self.project_dir, &self.config, path);
        let started_at = Local::now();
        let started = Instant::now();
        let mut results = Vec::new();
        let mut status = TestStatus::Passed;

        for step in &case.setup {
            if self.aborted() {
                status = TestStatus::Error;
                break;
            }
            let result = self.execute(step, StepPhase::Setup, &ctx);
            let ok = result.status.is_success();
            results.push(result);
            if !ok {
                tracing::warn!(test = %case.name, step = %step.id, "setup failed");
                status = TestStatus::Error;
                break;
            }
        }

        if status == TestStatus::Passed {
            for step in &case.steps {
                if self.aborted() {
                    status = TestStatus::Error;
                    break;
                }
                self.emit(RunEvent::StepStarted(step.id.clone()));
                self.hooks.emit_before_step(step);
                let result = self.execute(step, StepPhase::Main, &ctx);
                self.emit(RunEvent::StepCompleted(result.clone()));
                self.hooks.emit_after_step(step, &result);

                let ok = result.status.is_success();
                results.push(result);
                // A step allowed to fail doesn't fail the test.
                if !ok && !step.continue_on_failure {
                    status = TestStatus::Failed;
                    break;
                }
            }
        }

        for step in &case.teardown {
            let result = self.execute(step, StepPhase::Teardown, &ctx);
            if !result.status.is_success() {
                tracing::warn!(
                    test = %case.name,
                    step = %step.id,
                    error = result.error_message.as_deref().unwrap_or_default(),
                    "teardown step failed"
                );
            }
            results.push(result);
        }

        let result = TestResult {
            test_name: case.name,
            test_file: file,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            steps: results,
            started_at,
            finished_at: Local::now(),
            error_message: None,
        };
        tracing::info!(test = %result.test_name, status = ?result.status, duration_ms = result.duration_ms, "test finished");
        self.finish(result)
    }

    fn finish(&mut self, result: TestResult) -> TestResult {
        self.emit(RunEvent::TestCompleted(result.clone()));
        self.hooks.emit_after_test(&result);
        result
    }

    /// One step with retries, screenshot and slow-mode pause.
    fn execute(&self, step: &Step, phase: StepPhase, ctx: &RunContext) -> StepResult {
        let attempts = ctx.settings().attempts();
        let mut result = self.executor.execute(step, phase, ctx);
        let mut attempt = 1;
        while result.status == StepStatus::Failed && attempt < attempts {
            attempt += 1;
            tracing::info!(
                step = %step.id,
                attempt,
                of = attempts,
                error = result.error_message.as_deref().unwrap_or_default(),
                "retrying step"
            );
            result = self.executor.execute(step, phase, ctx);
        }

        let wants_screenshot =
            step.screenshot || ctx.screenshot_on_step() || (!result.status.is_success() && ctx.screenshot_on_failure());
        if wants_screenshot {
            if let Some(path) = self.capture(step, ctx) {
                result = result.with_screenshot(path.display().to_string());
            }
        }

        self.pause();
        result
    }

    fn capture(&self, step: &Step, ctx: &RunContext) -> Option<PathBuf> {
        let png = self.engine.take_screenshot(None);
        if png.is_empty() {
            tracing::warn!(step = %step.id, "screenshot capture returned nothing");
            return None;
        }
        match ctx.save_screenshot(&step.id, &png) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(step = %step.id, error = %e, "could not save screenshot");
                None
            }
        }
    }

    fn pause(&self) {
        let delay = self.config.settings.slow_mode();
        if delay > Duration::ZERO {
            std::thread::sleep(delay);
        }
    }

    fn ensure_connected(&self) {
        let target = &self.config.target_app;
        if self.engine.is_connected() || target.is_empty() {
            return;
        }
        // Setup steps may launch the app themselves.
        if let Err(e) = self.engine.launch_or_attach(target) {
            tracing::warn!(error = %e, "could not connect to target app");
        }
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A run in progress on its worker thread.
pub struct RunHandle {
    pub events: Receiver<RunEvent>,
    pub abort: AbortHandle,
    join: JoinHandle<RunSummary>,
}

impl RunHandle {
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn wait(self) -> Result<RunSummary> {
        self.join
            .join()
            .map_err(|_| Error::new(ErrorCode::Unknown, "runner thread panicked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::TestCase;
    use desktester_core::virtual_desktop::{VirtualApp, VirtualNode};
    use desktester_core::{ActionType, Bounds, LocatorStrategy, TargetApp, VirtualDesktop};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Test cases served from memory, keyed by file name.
    #[derive(Clone, Default)]
    struct Cases(Arc<Mutex<HashMap<PathBuf, TestCase>>>);

    impl Cases {
        fn add(&self, file: &str, case: TestCase) -> PathBuf {
            let path = PathBuf::from(file);
            self.0.lock().insert(path.clone(), case);
            path
        }
    }

    impl TestSource for Cases {
        fn load(&self, path: &Path) -> Result<TestCase> {
            self.0
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::new(ErrorCode::Io, format!("no such test: {}", path.display())))
        }
    }

    fn runner(dir: &Path) -> (TestRunner, Cases, VirtualDesktop) {
        let desktop = VirtualDesktop::new().with_poll_interval(Duration::from_millis(5));
        desktop.install(
            VirtualApp::new("Calc").with_root(
                VirtualNode::new("window").bounds(Bounds::new(0.0, 0.0, 100.0, 100.0)).child(
                    VirtualNode::new("button")
                        .identifier("btnOK")
                        .title("OK")
                        .bounds(Bounds::new(10.0, 10.0, 20.0, 10.0)),
                ),
            ),
        );
        let engine = Arc::new(AutomationEngine::new(desktop.clone()));
        let mut config = ProjectConfig::default();
        config.target_app = TargetApp::named("Calc");
        config.settings.default_timeout = 0.05;
        config.settings.screenshot_on_failure = false;
        let cases = Cases::default();
        let runner = TestRunner::new(engine, dir, config).with_source(cases.clone());
        (runner, cases, desktop)
    }

    /// Fails until its third run.
    struct Flaky(Arc<Mutex<u32>>);

    impl ScriptHost for Flaky {
        fn run(&self, _: &crate::script::ScriptScope<'_>, _: &str) -> Result<()> {
            let mut n = self.0.lock();
            *n += 1;
            if *n < 3 {
                Err(Error::new(ErrorCode::ActionFailed, "flaky"))
            } else {
                Ok(())
            }
        }
    }

    fn click(id: &str, target: &str) -> Step {
        Step::new(id, ActionType::Click).with_target(LocatorStrategy::id(target))
    }

    #[test]
    fn connects_before_each_test() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, cases, desktop) = runner(dir.path());
        let path = cases.add("a.json", TestCase::new("a").with_steps(vec![click("step_1", "btnOK")]));

        let result = runner.run_test(&path);
        assert_eq!(result.status, TestStatus::Passed);
        assert!(desktop.is_running("Calc"));

        // A teardown that closes the app doesn't break the next test.
        let path = cases.add(
            "b.json",
            TestCase::new("b")
                .with_steps(vec![click("step_1", "btnOK")])
                .with_teardown(vec![Step::new("t1", ActionType::CloseApp)]),
        );
        assert_eq!(runner.run_test(&path).status, TestStatus::Passed);
        assert!(!runner.engine().is_connected());
        assert_eq!(runner.run_test(&path).status, TestStatus::Passed);
    }

    #[test]
    fn retries_failed_steps() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, cases, _) = runner(dir.path());
        runner.config.settings.retry_count = 3;
        let attempts = Arc::new(Mutex::new(0));
        runner = runner.with_script_host(Flaky(attempts.clone()));
        let path = cases.add(
            "flaky.json",
            TestCase::new("flaky").with_steps(vec![Step::new("step_1", ActionType::RunScript).with_script("x")]),
        );
        let result = runner.run_test(&path);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(*attempts.lock(), 3);
        assert_eq!(result.steps.len(), 1);
    }

    #[test]
    fn unloadable_file_is_an_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, _, _) = runner(dir.path());
        let result = runner.run_test(Path::new("missing.json"));
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(result.test_name, "missing");
        assert!(result.steps.is_empty());
        assert!(result.error_message.unwrap().contains("no such test"));
    }

    #[test]
    fn screenshots_on_failure_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, cases, desktop) = runner(dir.path());
        runner.config.settings.screenshot_on_failure = true;
        desktop.set_screenshot(vec![0x89, b'P', b'N', b'G']);
        let path = cases.add(
            "shots.json",
            TestCase::new("shots").with_steps(vec![click("step_1", "btnOK"), click("step_2", "nope")]),
        );
        let result = runner.run_test(&path);
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.steps[0].screenshot_path, None);
        let shot = result.steps[1].screenshot_path.as_deref().unwrap();
        assert!(shot.contains("shots_step_2_"), "{}", shot);
        assert!(Path::new(shot).starts_with(dir.path().join("screenshots")));
    }

    #[test]
    fn empty_screenshot_is_not_attached() {
        let dir = tempfile::tempdir().unwrap();
        let (mut runner, cases, _) = runner(dir.path());
        let path = cases.add(
            "snap.json",
            TestCase::new("snap").with_steps(vec![click("step_1", "btnOK").with_screenshot()]),
        );
        let result = runner.run_test(&path);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.steps[0].screenshot_path, None);
    }

    #[test]
    fn tag_filter_skips() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, cases, _) = runner(dir.path());
        let mut runner = runner.with_tags(["smoke"]);
        let a = cases.add("a.json", TestCase::new("a").with_tags(["smoke"]).with_steps(vec![click("s", "btnOK")]));
        let b = cases.add("b.json", TestCase::new("b").with_tags(["nightly"]).with_steps(vec![click("s", "btnOK")]));
        let summary = runner.run_all(&[a, b]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.results[1].status, TestStatus::Skipped);
        assert!(summary.all_passed());
    }
}
