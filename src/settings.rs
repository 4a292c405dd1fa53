//! Runtime settings for a grading run.
//!
//! Loaded from an optional TOML file, then overridden by `KPI_GRADING_*`
//! environment variables, then validated.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GradingError, GradingResult};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GradingSettings {
    /// Whether KPIs configure and flush report plots.
    pub report_enabled: bool,
    /// Simulation step of the grading module, in seconds.
    pub module_step_time_s: f64,
    /// `tracing-subscriber` filter directive used by the binary.
    pub log_filter: String,
    /// Where the binary writes the JSON report when no path is given.
    pub report_dir: Option<PathBuf>,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            report_enabled: true,
            module_step_time_s: 0.1,
            log_filter: "kpi_grading=info".to_string(),
            report_dir: None,
        }
    }
}

impl GradingSettings {
    pub fn load(path: Option<&Path>) -> GradingResult<Self> {
        let mut settings = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    GradingError::InvalidConfig(format!("failed to read settings '{}': {e}", path.display()))
                })?;
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(s: &str) -> GradingResult<Self> {
        Ok(toml::from_str(s)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KPI_GRADING_REPORT_ENABLED") {
            if let Ok(b) = v.parse() {
                self.report_enabled = b;
            }
        }
        if let Ok(v) = std::env::var("KPI_GRADING_STEP_TIME_S") {
            if let Ok(t) = v.parse() {
                self.module_step_time_s = t;
            }
        }
        if let Ok(v) = std::env::var("KPI_GRADING_LOG_FILTER") {
            self.log_filter = v;
        }
        if let Ok(v) = std::env::var("KPI_GRADING_REPORT_DIR") {
            self.report_dir = Some(PathBuf::from(v));
        }
    }

    pub fn validate(&self) -> GradingResult<()> {
        if !(self.module_step_time_s > 0.0) {
            return Err(GradingError::InvalidConfig(format!(
                "module_step_time_s must be positive, got {}",
                self.module_step_time_s
            )));
        }
        Ok(())
    }
}
