//! Step Executor - one step against the engine, one result back
//!
//! Nothing escapes a step: every error becomes a `failed` result, except that
//! assertion steps distinguish `failed` (mismatch) from `error` (could not
//! evaluate).

use crate::assertions::{AssertionError, AssertionEvaluator};
use crate::context::RunContext;
use crate::resolve::{effective_locator, with_link_timeouts};
use crate::script::{LineScript, ScriptHost, ScriptScope};
use desktester_core::keys::PRIMARY_MODIFIER;
use desktester_core::resolve::{deadline_after, wait_secs};
use desktester_core::roles::DOCK_ITEM;
use desktester_core::{
    ActionType, AutomationEngine, Error, ErrorCode, Result, Step, StepPhase, StepResult, StepStatus, UIElement,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Poll interval for the `wait_for_*` actions.
pub const WAIT_POLL: Duration = Duration::from_millis(250);
/// Poll interval for `wait_for_window`.
pub const WINDOW_POLL: Duration = Duration::from_millis(500);
/// Per-link timeout while waiting for an element to go away.
pub const GONE_CHECK_SECS: f64 = 0.5;
/// Pause between select-all and delete in `clear_field`.
const CLEAR_PAUSE: Duration = Duration::from_millis(50);
/// `wait` without a duration.
const DEFAULT_WAIT_SECS: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("{}", .0.message)]
    Action(#[from] Error),
    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

impl StepError {
    fn status(&self) -> StepStatus {
        match self {
            StepError::Action(_) => StepStatus::Failed,
            StepError::Assertion(e) => e.status(),
        }
    }
}

pub struct StepExecutor {
    engine: Arc<AutomationEngine>,
    assertions: AssertionEvaluator,
    scripts: Box<dyn ScriptHost>,
    poll: Duration,
    window_poll: Duration,
}

impl StepExecutor {
    pub fn new(engine: Arc<AutomationEngine>) -> Self {
        Self {
            assertions: AssertionEvaluator::new(engine.clone()),
            engine,
            scripts: Box::new(LineScript),
            poll: WAIT_POLL,
            window_poll: WINDOW_POLL,
        }
    }

    pub fn with_script_host(mut self, host: impl ScriptHost + 'static) -> Self {
        self.scripts = Box::new(host);
        self
    }

    /// Shorter polls for the wait actions, e.g. against an in-memory desktop.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self.window_poll = poll;
        self
    }

    pub fn with_absence_timeout(mut self, timeout: Duration) -> Self {
        self.assertions = self.assertions.with_absence_timeout(timeout);
        self
    }

    pub fn engine(&self) -> &Arc<AutomationEngine> {
        &self.engine
    }

    pub fn execute(&self, step: &Step, phase: StepPhase, ctx: &RunContext) -> StepResult {
        let started = Instant::now();
        tracing::debug!(step = %step.id, action = %step.action, ?phase, "executing step");
        let outcome = self.perform(step, ctx);
        let elapsed = started.elapsed();

        match outcome {
            Ok(actual) => {
                let result = StepResult::new(step, phase, StepStatus::Passed, elapsed);
                match actual {
                    Some(actual) => result.with_actual(actual),
                    None => result,
                }
            }
            Err(e) => {
                let status = e.status();
                tracing::debug!(step = %step.id, ?status, error = %e, "step did not pass");
                let result = StepResult::new(step, phase, status, elapsed).with_error(e.to_string());
                match &e {
                    StepError::Assertion(a) => match a.actual() {
                        Some(actual) => result.with_actual(actual),
                        None => result,
                    },
                    StepError::Action(_) => result,
                }
            }
        }
    }

    fn perform(&self, step: &Step, ctx: &RunContext) -> std::result::Result<Option<String>, StepError> {
        if let Err(e) = step.validate() {
            return Err(match step.action {
                ActionType::Assert => AssertionError::from(e).into(),
                _ => e.into(),
            });
        }

        let engine = &self.engine;
        match step.action {
            ActionType::Click => {
                // The dock lives outside the target app's tree; clicking an
                // item there means bringing the app up.
                if step.target.as_ref().and_then(|t| t.role.as_deref()) == Some(DOCK_ITEM) {
                    engine.launch(ctx.target_app())?;
                } else {
                    engine.click(&self.resolve(step, ctx)?)?;
                }
            }
            ActionType::DoubleClick => engine.double_click(&self.resolve(step, ctx)?)?,
            ActionType::RightClick => engine.right_click(&self.resolve(step, ctx)?)?,
            ActionType::TypeText => {
                let text = step.text.as_deref().unwrap_or_default();
                match step.target {
                    Some(_) => engine.type_text(&self.resolve(step, ctx)?, text)?,
                    None => engine.type_keys(text)?,
                }
            }
            ActionType::KeyCombo => engine.key_combo(&step.keys)?,
            ActionType::ClearField => {
                let element = self.resolve(step, ctx)?;
                engine.click(&element)?;
                engine.key_combo(&[PRIMARY_MODIFIER.to_string(), "a".to_string()])?;
                std::thread::sleep(CLEAR_PAUSE);
                engine.key_combo(&["backspace".to_string()])?;
            }
            ActionType::LaunchApp => {
                engine.launch(ctx.target_app())?;
            }
            ActionType::CloseApp => engine.terminate_app()?,
            ActionType::Wait => {
                std::thread::sleep(wait_secs(step.duration.unwrap_or(DEFAULT_WAIT_SECS)));
            }
            ActionType::WaitForElement => self.wait_for_element(step, ctx)?,
            ActionType::WaitForElementGone => self.wait_for_element_gone(step, ctx)?,
            ActionType::WaitForWindow => self.wait_for_window(step, ctx)?,
            ActionType::Assert => return Ok(self.assertions.check(step, ctx.default_timeout())?),
            ActionType::RunScript => {
                let scope = ScriptScope {
                    engine: engine.as_ref(),
                    step,
                    target_app: ctx.target_app(),
                };
                self.scripts.run(&scope, step.script.as_deref().unwrap_or_default())?;
            }
        }
        Ok(None)
    }

    fn resolve(&self, step: &Step, ctx: &RunContext) -> Result<UIElement> {
        let target = step
            .target
            .as_ref()
            .ok_or_else(|| Error::invalid_step(&step.id, "no target defined"))?;
        self.engine
            .find_element(&effective_locator(target, step.timeout, ctx.default_timeout()))
    }

    fn wait_timeout(step: &Step, ctx: &RunContext) -> f64 {
        step.timeout.unwrap_or_else(|| ctx.default_timeout()).max(0.0)
    }

    fn wait_for_element(&self, step: &Step, ctx: &RunContext) -> Result<()> {
        let target = step
            .target
            .as_ref()
            .ok_or_else(|| Error::invalid_step(&step.id, "no target defined"))?;
        let timeout = Self::wait_timeout(step, ctx);
        let deadline = deadline_after(wait_secs(timeout));
        loop {
            match self.engine.try_find(target) {
                Ok(Some(_)) => return Ok(()),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!(step = %step.id, error = %e, "lookup failed, polling"),
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(&format!("element {}", target), timeout));
            }
            std::thread::sleep(self.poll);
        }
    }

    fn wait_for_element_gone(&self, step: &Step, ctx: &RunContext) -> Result<()> {
        let target = step
            .target
            .as_ref()
            .ok_or_else(|| Error::invalid_step(&step.id, "no target defined"))?;
        let quick = with_link_timeouts(target, GONE_CHECK_SECS);
        let timeout = Self::wait_timeout(step, ctx);
        let deadline = deadline_after(wait_secs(timeout));
        loop {
            match self.engine.find_element(&quick) {
                Err(e) if e.code == ErrorCode::ElementNotFound => return Ok(()),
                Err(e) => return Err(e),
                Ok(_) => {}
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(&format!("element {} to disappear", target), timeout));
            }
            std::thread::sleep(self.poll);
        }
    }

    fn wait_for_window(&self, step: &Step, ctx: &RunContext) -> Result<()> {
        let title = step
            .title
            .as_deref()
            .ok_or_else(|| Error::invalid_step(&step.id, "no title defined"))?;
        let needle = title.to_lowercase();
        let timeout = Self::wait_timeout(step, ctx);
        let deadline = deadline_after(wait_secs(timeout));
        loop {
            let apps = self.engine.list_running_applications()?;
            for app in apps.iter().filter(|a| a.name.to_lowercase().contains(&needle)) {
                let identifier = app
                    .bundle_id
                    .clone()
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| app.pid.to_string());
                match self.engine.attach(&identifier) {
                    Ok(_) => return Ok(()),
                    Err(e) => tracing::debug!(app = %app.name, error = %e, "attach failed, polling"),
                }
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(&format!("window '{}'", title), timeout));
            }
            std::thread::sleep(self.window_poll);
        }
    }
}
