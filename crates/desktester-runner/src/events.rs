//! Run progress notifications

use desktester_core::{RunSummary, StepResult, TestResult};

/// What a runner reports to its observers, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    TestStarted { name: String, path: String },
    /// Main-phase steps only.
    StepStarted(String),
    StepCompleted(StepResult),
    TestCompleted(TestResult),
    RunCompleted(RunSummary),
}

impl RunEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::TestStarted { .. } => "test_started",
            RunEvent::StepStarted(_) => "step_started",
            RunEvent::StepCompleted(_) => "step_completed",
            RunEvent::TestCompleted(_) => "test_completed",
            RunEvent::RunCompleted(_) => "run_completed",
        }
    }
}
