//! `run_script` steps
//!
//! Scripts are trusted-author input. The default host understands one command
//! per line and can only reach the engine, the current step and the target
//! app; it cannot touch the filesystem or spawn processes.
//!
//! ```text
//! # comment
//! click id:btnOK
//! type_into role:text_field AND label:Name => Ada
//! keys cmd+a
//! type hello
//! wait 0.5
//! wait_for text:Saved
//! log done
//! ```

use desktester_core::resolve::wait_secs;
use desktester_core::{AutomationEngine, Error, LocatorStrategy, Result, Step, TargetApp};

/// Everything a script may touch.
pub struct ScriptScope<'a> {
    pub engine: &'a AutomationEngine,
    pub step: &'a Step,
    pub target_app: &'a TargetApp,
}

pub trait ScriptHost: Send {
    fn run(&self, scope: &ScriptScope<'_>, script: &str) -> Result<()>;
}

impl<F> ScriptHost for F
where
    F: Fn(&ScriptScope<'_>, &str) -> Result<()> + Send,
{
    fn run(&self, scope: &ScriptScope<'_>, script: &str) -> Result<()> {
        self(scope, script)
    }
}

/// The line-command interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineScript;

impl ScriptHost for LineScript {
    fn run(&self, scope: &ScriptScope<'_>, script: &str) -> Result<()> {
        for (i, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = i + 1;
            tracing::debug!(step = %scope.step.id, line = line_no, command = line, "script");
            run_line(scope, line).map_err(|e| Error::script_failed(line_no, &e.message))?;
        }
        Ok(())
    }
}

fn run_line(scope: &ScriptScope<'_>, line: &str) -> Result<()> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };
    let engine = scope.engine;
    match command {
        "click" => engine.click(&engine.find_element(&locator(rest)?)?),
        "double_click" => engine.double_click(&engine.find_element(&locator(rest)?)?),
        "right_click" => engine.right_click(&engine.find_element(&locator(rest)?)?),
        "type" => engine.type_keys(rest),
        "type_into" => {
            let (target, text) = rest
                .split_once("=>")
                .ok_or_else(|| Error::invalid_step(&scope.step.id, "expected 'type_into <locator> => <text>'"))?;
            engine.type_text(&engine.find_element(&locator(target)?)?, text.trim())
        }
        "keys" => {
            let keys: Vec<String> = rest.split('+').map(|k| k.trim().to_string()).filter(|k| !k.is_empty()).collect();
            if keys.is_empty() {
                return Err(Error::invalid_step(&scope.step.id, "keys needs at least one key"));
            }
            engine.key_combo(&keys)
        }
        "wait" => {
            let secs: f64 = rest
                .parse()
                .ok()
                .filter(|s: &f64| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| Error::invalid_step(&scope.step.id, "wait needs seconds"))?;
            std::thread::sleep(wait_secs(secs));
            Ok(())
        }
        "wait_for" => engine.find_element(&locator(rest)?).map(|_| ()),
        "launch" => engine.launch(scope.target_app).map(|_| ()),
        "close" => engine.terminate_app(),
        "log" => {
            tracing::info!(step = %scope.step.id, "{}", rest);
            Ok(())
        }
        other => Err(Error::invalid_step(&scope.step.id, &format!("unknown script command '{}'", other))),
    }
}

fn locator(s: &str) -> Result<LocatorStrategy> {
    s.trim().parse()
}
