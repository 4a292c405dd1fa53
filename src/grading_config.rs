//! Grading configuration records: one [`EvalKpi`] per configured KPI, grouped
//! in a [`KpiGroup`] loaded from `grading.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GradingResult;

/// Declared type of a threshold's raw string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdKind {
    Bool,
    Double,
    String,
}

impl std::fmt::Display for ThresholdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdKind::Bool => write!(f, "bool"),
            ThresholdKind::Double => write!(f, "double"),
            ThresholdKind::String => write!(f, "string"),
        }
    }
}

/// One named threshold inside a KPI's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSpec {
    #[serde(rename = "thresholdID")]
    pub threshold_id: String,
    #[serde(rename = "thresholdType")]
    pub kind: ThresholdKind,
    #[serde(rename = "threshold")]
    pub raw_value: String,
    /// Display name used in the report's `thresholdInfo`.
    #[serde(default, rename = "thresholdName")]
    pub name: String,
    #[serde(default, rename = "thresholdUnit")]
    pub unit: String,
}

impl ThresholdSpec {
    pub fn new(id: &str, kind: ThresholdKind, raw: &str) -> Self {
        Self {
            threshold_id: id.to_string(),
            kind,
            raw_value: raw.to_string(),
            name: id.to_string(),
            unit: "N/A".to_string(),
        }
    }
}

/// A pass or finish condition: the detected-count limit and how it is phrased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_relation")]
    pub relation: String,
}

fn default_relation() -> String {
    "<".to_string()
}

impl Default for Condition {
    fn default() -> Self {
        Self { value: 0.0, relation: default_relation() }
    }
}

impl Condition {
    pub fn with_value(value: f64) -> Self {
        Self { value, ..Self::default() }
    }
}

/// Piecewise-linear score table over the detected count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMap1D {
    pub u: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KpiParameters {
    pub indicator_name: String,
    pub definition: String,
    pub thresholds: Vec<ThresholdSpec>,
    #[serde(rename = "scoreMap1d")]
    pub score_map_1d: Option<ScoreMap1D>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiCategory {
    pub features: Vec<String>,
    pub labels: Vec<String>,
}

/// Configuration record for one KPI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalKpi {
    pub name: String,
    #[serde(default)]
    pub pass_condition: Condition,
    #[serde(default)]
    pub finish_condition: Condition,
    #[serde(default)]
    pub parameters: KpiParameters,
    #[serde(default)]
    pub category: KpiCategory,
}

impl EvalKpi {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }

    pub fn with_threshold(mut self, spec: ThresholdSpec) -> Self {
        self.parameters.thresholds.push(spec);
        self
    }

    pub fn with_pass_condition(mut self, value: f64) -> Self {
        self.pass_condition = Condition::with_value(value);
        self
    }

    pub fn with_finish_condition(mut self, value: f64) -> Self {
        self.finish_condition = Condition::with_value(value);
        self
    }
}

/// Supplies KPI configuration records by KPI id.
pub trait ConfigProvider {
    /// Returns the configuration named `kpi_id`, or `None` if the scenario does not grade it.
    fn kpi_config_by_name(&self, kpi_id: &str) -> Option<EvalKpi>;
}

/// The scenario's list of graded KPIs, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiGroup {
    #[serde(default, rename = "kpi")]
    pub kpis: Vec<EvalKpi>,
}

impl KpiGroup {
    pub fn new(kpis: Vec<EvalKpi>) -> Self {
        Self { kpis }
    }

    pub fn from_json_str(s: &str) -> GradingResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> GradingResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let group = Self::from_json_str(&contents)?;
        tracing::info!(path = %path.display(), kpis = group.kpis.len(), "loaded grading config");
        Ok(group)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kpis.iter().map(|k| k.name.as_str())
    }
}

impl ConfigProvider for KpiGroup {
    fn kpi_config_by_name(&self, kpi_id: &str) -> Option<EvalKpi> {
        self.kpis.iter().find(|k| k.name == kpi_id).cloned()
    }
}
