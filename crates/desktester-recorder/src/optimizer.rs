//! Step Optimizer - one cleanup pass over a finished recording
//!
//! Passes run in a fixed order:
//! 1. consecutive single-character `type_text` steps merge into one
//! 2. a `click` directly before a `double_click` on the same target is dropped
//! 3. ids are renumbered `step_1..step_N`

use desktester_core::{ActionType, Step};

pub fn optimize(steps: Vec<Step>) -> Vec<Step> {
    let steps = merge_keystrokes(steps);
    let steps = drop_double_click_artifacts(steps);
    renumber(steps)
}

fn is_single_char(step: &Step) -> bool {
    step.action == ActionType::TypeText
        && step.keys.is_empty()
        && step.text.as_deref().map(|t| t.chars().count() == 1).unwrap_or(false)
}

fn merge_keystrokes(steps: Vec<Step>) -> Vec<Step> {
    let mut out = Vec::with_capacity(steps.len());
    let mut run: Vec<Step> = Vec::new();

    for step in steps {
        if is_single_char(&step) {
            run.push(step);
            continue;
        }
        if !run.is_empty() {
            out.push(collapse(std::mem::take(&mut run)));
        }
        out.push(step);
    }
    if !run.is_empty() {
        out.push(collapse(run));
    }
    out
}

/// One `type_text` step for the whole run, targeted like its first step.
fn collapse(run: Vec<Step>) -> Step {
    let text: String = run.iter().filter_map(|s| s.text.as_deref()).collect();
    let target = run.into_iter().next().and_then(|s| s.target);
    let step = Step::new("", ActionType::TypeText)
        .with_description(format!("Type \"{}\"", text))
        .with_text(text);
    match target {
        Some(target) => step.with_target(target),
        None => step,
    }
}

/// The listener reports the first press of a double click as a click of its
/// own; that click is dropped and the double click kept.
fn drop_double_click_artifacts(steps: Vec<Step>) -> Vec<Step> {
    let mut out: Vec<Step> = Vec::with_capacity(steps.len());
    let mut iter = steps.into_iter().peekable();
    while let Some(step) = iter.next() {
        let artifact = step.action == ActionType::Click
            && iter
                .peek()
                .map(|next| next.action == ActionType::DoubleClick && next.target == step.target)
                .unwrap_or(false);
        if !artifact {
            out.push(step);
        }
    }
    out
}

fn renumber(mut steps: Vec<Step>) -> Vec<Step> {
    for (i, step) in steps.iter_mut().enumerate() {
        step.id = format!("step_{}", i + 1);
    }
    steps
}
