//! Before/after callbacks around tests and steps
//!
//! Hooks observe a run; they cannot change it. A hook that returns an error
//! or panics is logged and skipped, and the run carries on.

use desktester_core::{Step, StepResult, TestResult};
use std::panic::{catch_unwind, AssertUnwindSafe};

type BeforeTest = Box<dyn Fn(&str) -> anyhow::Result<()> + Send>;
type AfterTest = Box<dyn Fn(&TestResult) -> anyhow::Result<()> + Send>;
type BeforeStep = Box<dyn Fn(&Step) -> anyhow::Result<()> + Send>;
type AfterStep = Box<dyn Fn(&Step, &StepResult) -> anyhow::Result<()> + Send>;

#[derive(Default)]
pub struct RunHooks {
    before_test: Vec<BeforeTest>,
    after_test: Vec<AfterTest>,
    before_step: Vec<BeforeStep>,
    after_step: Vec<AfterStep>,
}

impl RunHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the test name before setup runs.
    pub fn before_test(&mut self, hook: impl Fn(&str) -> anyhow::Result<()> + Send + 'static) {
        self.before_test.push(Box::new(hook));
    }

    pub fn after_test(&mut self, hook: impl Fn(&TestResult) -> anyhow::Result<()> + Send + 'static) {
        self.after_test.push(Box::new(hook));
    }

    /// Main-phase steps only.
    pub fn before_step(&mut self, hook: impl Fn(&Step) -> anyhow::Result<()> + Send + 'static) {
        self.before_step.push(Box::new(hook));
    }

    pub fn after_step(&mut self, hook: impl Fn(&Step, &StepResult) -> anyhow::Result<()> + Send + 'static) {
        self.after_step.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.before_test.len() + self.after_test.len() + self.before_step.len() + self.after_step.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn emit_before_test(&self, name: &str) {
        for hook in &self.before_test {
            guarded("before_test", || hook(name));
        }
    }

    pub(crate) fn emit_after_test(&self, result: &TestResult) {
        for hook in &self.after_test {
            guarded("after_test", || hook(result));
        }
    }

    pub(crate) fn emit_before_step(&self, step: &Step) {
        for hook in &self.before_step {
            guarded("before_step", || hook(step));
        }
    }

    pub(crate) fn emit_after_step(&self, step: &Step, result: &StepResult) {
        for hook in &self.after_step {
            guarded("after_step", || hook(step, result));
        }
    }
}

fn guarded(event: &str, hook: impl FnOnce() -> anyhow::Result<()>) {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(event, error = %format!("{:#}", e), "hook failed"),
        Err(_) => tracing::warn!(event, "hook panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desktester_core::ActionType;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn failing_hooks_do_not_stop_later_ones() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = RunHooks::new();
        hooks.before_step(|_| anyhow::bail!("broken"));
        hooks.before_step(|_| panic!("worse"));
        let s = seen.clone();
        hooks.before_step(move |step| {
            s.lock().push(step.id.clone());
            Ok(())
        });
        assert_eq!(hooks.len(), 3);

        hooks.emit_before_step(&Step::new("step_1", ActionType::Click));
        assert_eq!(*seen.lock(), vec!["step_1".to_string()]);
    }

    #[test]
    fn test_hooks_receive_name() {
        let seen = Arc::new(Mutex::new(String::new()));
        let mut hooks = RunHooks::new();
        let s = seen.clone();
        hooks.before_test(move |name| {
            s.lock().push_str(name);
            Ok(())
        });
        hooks.emit_before_test("login");
        assert_eq!(seen.lock().as_str(), "login");
    }
}
