//! Project configuration
//!
//! A project is a directory with a `project.json` describing the application
//! under test and run settings. Every field has a default so a partial (or
//! empty) document is valid.

use desktester_core::resolve::wait_secs;
use desktester_core::{Result, TargetApp};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub screenshot_on_failure: bool,
    pub screenshot_on_step: bool,
    /// Seconds. Replaces the stock locator timeout on targets that don't set their own.
    pub default_timeout: f64,
    /// Attempts for a step whose result is `failed`.
    pub retry_count: u32,
    /// Seconds slept after every step and between tests.
    pub slow_mode_delay: f64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            screenshot_on_failure: true,
            screenshot_on_step: false,
            default_timeout: 5.0,
            retry_count: 1,
            slow_mode_delay: 0.0,
        }
    }
}

impl ProjectSettings {
    pub fn attempts(&self) -> u32 {
        self.retry_count.max(1)
    }

    pub fn slow_mode(&self) -> Duration {
        wait_secs(self.slow_mode_delay)
    }

    pub fn default_timeout_duration(&self) -> Duration {
        wait_secs(self.default_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub version: String,
    pub description: String,
    pub target_app: TargetApp,
    pub settings: ProjectSettings,
    pub tests_dir: String,
    pub fixtures_dir: String,
    pub screenshots_dir: String,
    pub reports_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Untitled Project".to_string(),
            version: "1.0".to_string(),
            description: String::new(),
            target_app: TargetApp::default(),
            settings: ProjectSettings::default(),
            tests_dir: "tests".to_string(),
            fixtures_dir: "fixtures".to_string(),
            screenshots_dir: "screenshots".to_string(),
            reports_dir: "reports".to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: ProjectConfig = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), project = %config.name, "loaded project config");
        Ok(config)
    }

    /// `<dir>/project.json`, or the defaults when the file doesn't exist.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(PROJECT_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn tests_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.tests_dir)
    }

    pub fn fixtures_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.fixtures_dir)
    }

    pub fn screenshots_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.screenshots_dir)
    }

    pub fn reports_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.reports_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: ProjectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert!(config.settings.screenshot_on_failure);
        assert!(!config.settings.screenshot_on_step);
        assert_eq!(config.settings.default_timeout, 5.0);
        assert_eq!(config.settings.retry_count, 1);
        assert_eq!(config.settings.slow_mode(), Duration::ZERO);
    }

    #[test]
    fn partial_settings_keep_other_defaults() {
        let config: ProjectConfig = serde_json::from_str(
            r#"{
                "name": "Calc",
                "target_app": {"bundle_id": "com.apple.calculator"},
                "settings": {"retry_count": 3, "slow_mode_delay": 0.25},
                "screenshots_dir": "shots"
            }"#,
        )
        .unwrap();
        assert_eq!(config.name, "Calc");
        assert_eq!(config.target_app.bundle_id.as_deref(), Some("com.apple.calculator"));
        assert_eq!(config.settings.attempts(), 3);
        assert_eq!(config.settings.slow_mode(), Duration::from_millis(250));
        assert!(config.settings.screenshot_on_failure);
        assert_eq!(config.screenshots_path(Path::new("/p")), PathBuf::from("/p/shots"));
        assert_eq!(config.tests_path(Path::new("/p")), PathBuf::from("/p/tests"));
    }

    #[test]
    fn zero_retries_still_attempts_once() {
        let settings = ProjectSettings {
            retry_count: 0,
            ..ProjectSettings::default()
        };
        assert_eq!(settings.attempts(), 1);
    }

    #[test]
    fn save_then_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectConfig::load_dir(dir.path()).unwrap(), ProjectConfig::default());

        let mut config = ProjectConfig::default();
        config.name = "Notes".to_string();
        config.settings.screenshot_on_step = true;
        config.save(dir.path().join(PROJECT_FILE)).unwrap();
        assert_eq!(ProjectConfig::load_dir(dir.path()).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE);
        fs::write(&path, "{ nope").unwrap();
        assert!(ProjectConfig::load(&path).is_err());
    }
}
