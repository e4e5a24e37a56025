//! desktester - desktop UI test automation
//!
//! Record interactions against a running application, save them as test
//! files, and replay them with setup and teardown phases, assertions and
//! screenshots.
//!
//! The pieces live in their own crates and are re-exported here:
//!
//! - [`automation`]: locators, platform backends and the [`AutomationEngine`]
//! - [`recorder`]: raw input events to optimized [`Step`]s
//! - [`runner`]: test files to a [`RunSummary`]
//!
//! ```no_run
//! use desktester::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = Arc::new(AutomationEngine::for_current_platform()?);
//! engine.launch_or_attach(&TargetApp::bundle("com.apple.calculator"))?;
//!
//! let mut session = RecordingSession::for_current_platform(engine.clone())?;
//! session.start()?;
//! session.pump(Duration::from_secs(10))?;
//! let case = TestCase::new("calculator").with_steps(session.stop());
//! JsonTestSource.save("tests/calculator.json".as_ref(), &case)?;
//!
//! let mut runner = TestRunner::for_project(engine, ".")?;
//! let summary = runner.run_project()?;
//! assert!(summary.all_passed());
//! # Ok::<(), desktester::Error>(())
//! ```

pub use desktester_core as automation;
pub use desktester_recorder as recorder;
pub use desktester_runner as runner;

pub use desktester_core::{
    AutomationEngine, Error, ErrorCode, LocatorStrategy, Result, RunSummary, Step, StepResult, TargetApp, TestResult,
    VirtualDesktop,
};
pub use desktester_recorder::RecordingSession;
pub use desktester_runner::{ProjectConfig, TestCase, TestRunner};

pub mod prelude {
    pub use desktester_core::prelude::*;
    pub use desktester_core::{RunSummary, StepPhase, StepResult, StepStatus, TestResult, TestStatus};
    pub use desktester_recorder::prelude::*;
    pub use desktester_runner::prelude::*;
    pub use desktester_runner::JsonTestSource;
}

/// Whether the process may drive other applications' UI.
pub fn has_accessibility() -> bool {
    desktester_core::has_accessibility()
}
