//! Per-test execution context

use crate::config::{ProjectConfig, ProjectSettings};
use desktester_core::{Result, TargetApp};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paths and settings one test file runs with.
#[derive(Debug, Clone)]
pub struct RunContext {
    test_file: PathBuf,
    screenshot_dir: PathBuf,
    settings: ProjectSettings,
    target_app: TargetApp,
}

impl RunContext {
    pub fn new(project_dir: &Path, config: &ProjectConfig, test_file: &Path) -> Self {
        Self {
            test_file: test_file.to_path_buf(),
            screenshot_dir: config.screenshots_path(project_dir),
            settings: config.settings.clone(),
            target_app: config.target_app.clone(),
        }
    }

    pub fn test_file(&self) -> &Path {
        &self.test_file
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn target_app(&self) -> &TargetApp {
        &self.target_app
    }

    pub fn screenshot_on_failure(&self) -> bool {
        self.settings.screenshot_on_failure
    }

    pub fn screenshot_on_step(&self) -> bool {
        self.settings.screenshot_on_step
    }

    /// Seconds.
    pub fn default_timeout(&self) -> f64 {
        self.settings.default_timeout
    }

    pub fn slow_mode_delay(&self) -> Duration {
        self.settings.slow_mode()
    }

    /// Writes `{test_stem}_{step_id}_{YYYYmmdd_HHMMSS}.png`, creating the
    /// directory on first use.
    pub fn save_screenshot(&self, step_id: &str, png: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.screenshot_dir)?;
        let path = self.screenshot_dir.join(self.screenshot_name(step_id, chrono::Local::now()));
        fs::write(&path, png)?;
        Ok(path)
    }

    fn screenshot_name(&self, step_id: &str, at: chrono::DateTime<chrono::Local>) -> String {
        let stem = self
            .test_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "test".to_string());
        format!("{}_{}_{}.png", stem, step_id, at.format("%Y%m%d_%H%M%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn screenshot_file_name() {
        let ctx = RunContext::new(Path::new("/p"), &ProjectConfig::default(), Path::new("/p/tests/login.json"));
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(ctx.screenshot_name("step_2", at), "login_step_2_20240309_140507.png");
        assert_eq!(ctx.screenshot_dir(), Path::new("/p/screenshots"));
    }

    #[test]
    fn save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(dir.path(), &ProjectConfig::default(), &dir.path().join("tests/a.json"));
        let path = ctx.save_screenshot("step_1", b"png").unwrap();
        assert!(path.starts_with(dir.path().join("screenshots")));
        assert_eq!(fs::read(&path).unwrap(), b"png");
    }
}
