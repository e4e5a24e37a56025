//! desktester-runner - run authored or recorded tests against a desktop app
//!
//! A [`TestRunner`] loads test files through a [`TestSource`], executes their
//! setup, main and teardown steps with a [`StepExecutor`], and aggregates the
//! outcome into a [`RunSummary`](desktester_core::RunSummary). Progress is
//! reported as [`RunEvent`]s on crossbeam channels and through [`RunHooks`].
//!
//! # Example
//!
//! ```no_run
//! use desktester_core::AutomationEngine;
//! use desktester_runner::TestRunner;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(AutomationEngine::for_current_platform()?);
//! let mut runner = TestRunner::for_project(engine, "./my-project")?;
//! let summary = runner.run_project()?;
//! println!("{}/{} passed", summary.passed, summary.total);
//! # Ok::<(), desktester_core::Error>(())
//! ```

pub mod assertions;
pub mod config;
pub mod context;
pub mod events;
pub mod executor;
pub mod hooks;
pub mod resolve;
pub mod runner;
pub mod script;
pub mod testcase;

pub use assertions::{AssertionError, AssertionEvaluator};
pub use config::{ProjectConfig, ProjectSettings};
pub use context::RunContext;
pub use events::RunEvent;
pub use executor::StepExecutor;
pub use hooks::RunHooks;
pub use runner::{AbortHandle, RunHandle, TestRunner};
pub use script::{LineScript, ScriptHost, ScriptScope};
pub use testcase::{JsonTestSource, TestCase, TestSource};

pub mod prelude {
    pub use crate::config::{ProjectConfig, ProjectSettings};
    pub use crate::events::RunEvent;
    pub use crate::runner::{AbortHandle, RunHandle, TestRunner};
    pub use crate::testcase::{TestCase, TestSource};
}
