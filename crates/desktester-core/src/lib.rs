//! desktester-core - element location and input synthesis for desktop UI tests
//!
//! Locators resolve against a [`PlatformBackend`] with per-link timeouts and
//! fallback chains; the [`AutomationEngine`] pairs a backend with the single
//! application under test.
//!
//! ## Platform Support
//!
//! - **macOS**: Accessibility API + CoreGraphics events
//! - **Windows**: UI Automation + SendInput
//! - **Linux**: not supported (AT-SPI2 would be the route)
//!
//! [`VirtualDesktop`] implements the same contract in memory on every host.

pub mod apps;
pub mod backend;
pub mod element;
pub mod engine;
pub mod error;
pub mod keys;
pub mod locator;
pub mod platform;
pub mod resolve;
pub mod roles;
pub mod screenshot;
pub mod selector;
pub mod step;
pub mod virtual_desktop;

pub use apps::{AppManager, TargetApp};
pub use backend::{AppInfo, PlatformBackend};
pub use element::{Bounds, ElementNode, UIElement};
pub use engine::AutomationEngine;
pub use error::{Error, ErrorCode, Result};
pub use locator::{LocatorStrategy, LocatorType};
pub use step::{
    ActionType, AssertionSpec, AssertionType, ComparisonOperator, RunSummary, Step, StepPhase, StepResult,
    StepStatus, TestResult, TestStatus,
};
pub use virtual_desktop::VirtualDesktop;

pub mod prelude {
    pub use crate::apps::TargetApp;
    pub use crate::backend::{AppInfo, PlatformBackend};
    pub use crate::element::{Bounds, UIElement};
    pub use crate::engine::AutomationEngine;
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::locator::{LocatorStrategy, LocatorType};
    pub use crate::step::{ActionType, AssertionSpec, AssertionType, ComparisonOperator, Step};
}

/// Check if the process has the accessibility access a native backend needs
pub fn has_accessibility() -> bool {
    platform::has_accessibility()
}
