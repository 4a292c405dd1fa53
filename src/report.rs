//! Report model: one [`ReportCase`] per KPI (plus accompany cases), XY-plot
//! attachments, verdicts and the scenario-level [`TestReport`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::grading_config::{EvalKpi, ScoreMap1D, ThresholdKind};

/// Sentinel for "no value" in scores, grades and threshold bands.
pub const UNSET: f64 = i32::MIN as f64;
/// Sentinel band value written by [`XyPlot::new`] until a real threshold is set.
pub const UNBOUNDED: f64 = i32::MAX as f64;

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestState {
    Pass,
    Fail,
    Skipped,
    Undefined,
}

impl std::fmt::Display for TestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestState::Pass      => write!(f, "pass"),
            TestState::Fail      => write!(f, "fail"),
            TestState::Skipped   => write!(f, "skipped"),
            TestState::Undefined => write!(f, "undefined"),
        }
    }
}

/// Verdict returned by [`crate::kpi::ScenarioGate::is_eval_pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalResult {
    pub state: TestState,
    pub reason: String,
}

impl EvalResult {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self { state: TestState::Pass, reason: reason.into() }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self { state: TestState::Fail, reason: reason.into() }
    }

    pub fn is_pass(&self) -> bool {
        self.state == TestState::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub state: TestState,
    pub reason: String,
    pub score: f64,
    pub grade: f64,
}

// ---------------------------------------------------------------------------
// XY plots
// ---------------------------------------------------------------------------

/// Upper or lower threshold band drawn alongside a y axis.
///
/// `space` and `kind` are interval codes passed through to the report viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub desc: String,
    pub unit: String,
    pub space: u32,
    pub kind: u32,
    pub values: Vec<f64>,
}

impl ThresholdBand {
    pub fn new(desc: &str, space: u32, kind: u32, value: f64) -> Self {
        Self {
            desc: desc.to_string(),
            unit: String::new(),
            space,
            kind,
            values: vec![value],
        }
    }

    /// A band with no limit, used for the side of an axis that has none.
    pub fn none() -> Self {
        Self::new("", 0, 0, UNSET)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub unit: String,
    pub data: Vec<f64>,
    pub threshold_upper: ThresholdBand,
    pub threshold_lower: ThresholdBand,
}

impl Axis {
    fn named(name: &str, unit: &str) -> Self {
        Self { name: name.to_string(), unit: unit.to_string(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XyPlot {
    pub name: String,
    pub description: String,
    pub x_axis: Axis,
    pub y_axes: Vec<Axis>,
}

impl XyPlot {
    /// Configure a plot with one y axis per `(name, unit)` pair. Each y axis
    /// starts with [`UNBOUNDED`] bands. Zero pairs yields a single `default` axis.
    pub fn new(name: &str, description: &str, x_name: &str, x_unit: &str, y_axes: &[(&str, &str)]) -> Self {
        let mut y: Vec<Axis> = y_axes
            .iter()
            .map(|(n, u)| {
                let band = ThresholdBand {
                    unit: u.to_string(),
                    values: vec![UNBOUNDED],
                    ..ThresholdBand::default()
                };
                Axis {
                    threshold_upper: band.clone(),
                    threshold_lower: band,
                    ..Axis::named(n, u)
                }
            })
            .collect();
        if y.is_empty() {
            y.push(Axis::named("default", "null"));
        }
        Self {
            name: name.to_string(),
            description: description.to_string(),
            x_axis: Axis::named(x_name, x_unit),
            y_axes: y,
        }
    }

    /// Set both bands of y axis `y_axis`. Returns `false` for an out-of-range axis.
    pub fn set_threshold(&mut self, y_axis: usize, upper: ThresholdBand, lower: ThresholdBand) -> bool {
        let Some(axis) = self.y_axes.get_mut(y_axis) else {
            error!(plot = %self.name, y_axis, axes = self.y_axes.len(), "xy plot has no such y axis");
            return false;
        };
        let unit = axis.unit.clone();
        axis.threshold_upper = ThresholdBand { unit: unit.clone(), ..upper };
        axis.threshold_lower = ThresholdBand { unit, ..lower };
        true
    }

    /// Empty band values of the given axes, for thresholds that are appended per sample.
    pub fn clear_threshold_values(&mut self, y_axes: &[usize], upper: bool, lower: bool) {
        for &id in y_axes {
            if let Some(axis) = self.y_axes.get_mut(id) {
                if upper {
                    axis.threshold_upper.values.clear();
                }
                if lower {
                    axis.threshold_lower.values.clear();
                }
            }
        }
    }

    /// Append one sample: timestamp plus one value per y axis (extra values are ignored).
    pub fn push_sample(&mut self, t: f64, values: &[f64]) {
        self.x_axis.data.push(t);
        for (axis, v) in self.y_axes.iter_mut().zip(values) {
            axis.data.push(*v);
        }
    }

    /// Append a per-sample upper threshold to y axis `y_axis`.
    pub fn push_upper_threshold(&mut self, y_axis: usize, value: f64) {
        if let Some(axis) = self.y_axes.get_mut(y_axis) {
            axis.threshold_upper.values.push(value);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.x_axis.data.len()
    }
}

// ---------------------------------------------------------------------------
// Report case
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairData {
    pub key: String,
    pub value: String,
}

impl PairData {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self { key: key.to_string(), value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    XyPlot(XyPlot),
    Pair(PairData),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStep {
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub level1: String,
    pub level2: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseInfo {
    pub name: String,
    pub desc: String,
    pub category: Category,
    pub thresh: f64,
    pub grading_kpi: Option<EvalKpi>,
    pub additionals: Vec<PairData>,
    pub detected_count: u32,
    pub request_stop: bool,
    pub result: Option<TestResult>,
}

/// The record one KPI contributes to the final report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportCase {
    pub info: CaseInfo,
    pub steps: Vec<ReportStep>,
}

impl ReportCase {
    pub fn add_xy_plot(&mut self, plot: XyPlot) {
        self.steps.push(ReportStep { attachments: vec![Attachment::XyPlot(plot)] });
    }

    pub fn add_pair(&mut self, pair: PairData) {
        self.steps.push(ReportStep { attachments: vec![Attachment::Pair(pair)] });
    }

    pub fn plots(&self) -> impl Iterator<Item = &XyPlot> {
        self.steps.iter().flat_map(|s| &s.attachments).filter_map(|a| match a {
            Attachment::XyPlot(p) => Some(p),
            Attachment::Pair(_) => None,
        })
    }

    pub fn additional(&self, key: &str) -> Option<&str> {
        self.info.additionals.iter().find(|p| p.key == key).map(|p| p.value.as_str())
    }

    pub fn set_test_result(&mut self, state: TestState, reason: &str, score: f64, grade: f64) {
        self.info.result = Some(TestResult { state, reason: reason.to_string(), score, grade });
    }
}

/// Echo a KPI's configuration into its case: name, category, thresholds and conditions.
pub fn set_case_info(case: &mut ReportCase, kpi: &EvalKpi) {
    let params = &kpi.parameters;
    let info = &mut case.info;
    info.name = if params.indicator_name.is_empty() { kpi.name.clone() } else { params.indicator_name.clone() };
    info.desc = params.definition.clone();
    info.category.level1 = kpi.category.features.first().cloned().unwrap_or_default();
    info.category.level2 = kpi
        .category
        .labels
        .iter()
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join(";");
    info.grading_kpi = Some(kpi.clone());

    let mut threshold_info = Vec::with_capacity(params.thresholds.len());
    if let Some(first) = params.thresholds.first() {
        info.thresh = first.raw_value.trim().parse::<f64>().unwrap_or_else(|_| {
            warn!(kpi = %kpi.name, raw = %first.raw_value, "first threshold is not a number");
            0.0
        });
        for t in &params.thresholds {
            let value = match t.kind {
                ThresholdKind::Bool if t.raw_value.trim() == "0" => "false".to_string(),
                ThresholdKind::Bool => "true".to_string(),
                _ => t.raw_value.clone(),
            };
            let unit = if t.unit == "N/A" { "" } else { t.unit.as_str() };
            threshold_info.push(format!("{}:{}{}", t.name, value, unit));
        }
    }
    info.additionals.push(PairData::new("thresholdInfo", threshold_info.join(";")));

    let relation = match kpi.pass_condition.relation.as_str() {
        ">" => "greater than",
        "<=" => "at most",
        ">=" => "at least",
        _ => "less than",
    };
    info.additionals.push(PairData::new(
        "passCondition",
        format!("detected count {} {}", relation, kpi.pass_condition.value),
    ));
    info.additionals.push(PairData::new("finishCondition", kpi.finish_condition.value.to_string()));
}

// ---------------------------------------------------------------------------
// Scoring and statistics
// ---------------------------------------------------------------------------

/// Piecewise-linear lookup, clamped at both ends. Malformed maps yield [`UNSET`].
pub fn lookup_score_from_map_1d(map: &ScoreMap1D, u: f64) -> f64 {
    if map.u.len() < 2 || map.u.len() != map.y.len() {
        return UNSET;
    }
    if map.u.windows(2).any(|w| w[1] <= w[0]) {
        error!(?map, "u of score map must be strictly increasing");
        return UNSET;
    }

    let last = map.u.len() - 1;
    if u < map.u[0] {
        return map.y[0];
    }
    if u > map.u[last] {
        return map.y[last];
    }

    // first index whose u is > the sample; the segment is [right-1, right]
    let right = map.u.partition_point(|&x| x <= u).clamp(1, last);
    let left = right - 1;
    let (u0, u1, y0, y1) = (map.u[left], map.u[right], map.y[left], map.y[right]);
    (y1 - y0) * (u - u0) / (u1 - u0) + y0
}

/// Score a case from its detected count using the KPI's score map.
pub fn score_case_by_pass_condition(kpi: &EvalKpi, case: &mut ReportCase) {
    let score = match &kpi.parameters.score_map_1d {
        Some(map) => lookup_score_from_map_1d(map, case.info.detected_count as f64),
        None => UNSET,
    };
    if let Some(result) = case.info.result.as_mut() {
        result.score = score;
    }
}

pub fn axis_average(axis: &Axis) -> f64 {
    if axis.data.is_empty() {
        return 0.0;
    }
    axis.data.iter().sum::<f64>() / axis.data.len() as f64
}

/// Population variance of an axis' samples.
pub fn axis_variance(axis: &Axis) -> f64 {
    if axis.data.is_empty() {
        return 0.0;
    }
    let mean = axis_average(axis);
    axis.data.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / axis.data.len() as f64
}

// ---------------------------------------------------------------------------
// Scenario report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub report_id: String,
    pub report_version: String,
    pub scene_name: String,
    pub start_second: f64,
    pub end_second: f64,
    pub duration_second: f64,
    pub is_pass: bool,
    pub reason: String,
    pub cases: Vec<ReportCase>,
    pub feedback: BTreeMap<String, String>,
}

impl TestReport {
    pub fn new(scene_name: &str, start_second: f64) -> Self {
        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            report_version: "2.1".to_string(),
            scene_name: scene_name.to_string(),
            start_second,
            end_second: start_second,
            duration_second: 0.0,
            is_pass: true,
            reason: String::new(),
            cases: Vec::new(),
            feedback: BTreeMap::new(),
        }
    }

    pub fn set_end_second(&mut self, second: f64) {
        self.end_second = second;
        self.duration_second = second - self.start_second;
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading_config::ThresholdSpec;

    #[test]
    fn test_plot_defaults() {
        let plot = XyPlot::new("acc", "", "t", "s", &[("acc", "m/s2"), ("thresh", "m/s2")]);
        assert_eq!(plot.y_axes.len(), 2);
        assert_eq!(plot.y_axes[0].threshold_upper.values, vec![UNBOUNDED]);
        assert_eq!(plot.y_axes[1].threshold_lower.unit, "m/s2");

        let empty = XyPlot::new("x", "", "t", "s", &[]);
        assert_eq!(empty.y_axes.len(), 1);
        assert_eq!(empty.y_axes[0].name, "default");
    }

    #[test]
    fn test_plot_threshold_out_of_range() {
        let mut plot = XyPlot::new("acc", "", "t", "s", &[("acc", "m/s2")]);
        assert!(plot.set_threshold(0, ThresholdBand::new("upper", 0, 1, 2.5), ThresholdBand::none()));
        assert_eq!(plot.y_axes[0].threshold_upper.values, vec![2.5]);
        assert_eq!(plot.y_axes[0].threshold_upper.unit, "m/s2");
        assert!(!plot.set_threshold(3, ThresholdBand::none(), ThresholdBand::none()));
    }

    #[test]
    fn test_plot_samples_and_clear() {
        let mut plot = XyPlot::new("acc", "", "t", "s", &[("a", ""), ("b", "")]);
        plot.clear_threshold_values(&[0], true, false);
        assert!(plot.y_axes[0].threshold_upper.values.is_empty());
        assert_eq!(plot.y_axes[0].threshold_lower.values, vec![UNBOUNDED]);
        plot.push_sample(0.1, &[1.0, 2.0, 3.0]);
        plot.push_upper_threshold(0, 4.0);
        assert_eq!(plot.sample_count(), 1);
        assert_eq!(plot.y_axes[1].data, vec![2.0]);
        assert_eq!(plot.y_axes[0].threshold_upper.values, vec![4.0]);
    }

    #[test]
    fn test_set_case_info() {
        let mut kpi = EvalKpi::new("OverSpeed")
            .with_pass_condition(1.0)
            .with_threshold(ThresholdSpec {
                unit: "%".into(),
                ..ThresholdSpec::new("Speed_Tolerance", ThresholdKind::Double, "10")
            })
            .with_threshold(ThresholdSpec::new("Strict", ThresholdKind::Bool, "0"));
        kpi.category.features = vec!["regulation".into()];
        kpi.category.labels = vec!["a".into(), "b".into()];

        let mut case = ReportCase::default();
        set_case_info(&mut case, &kpi);
        assert_eq!(case.info.name, "OverSpeed");
        assert_eq!(case.info.thresh, 10.0);
        assert_eq!(case.info.category.level1, "regulation");
        assert_eq!(case.info.category.level2, "b;a");
        assert_eq!(case.additional("thresholdInfo"), Some("Speed_Tolerance:10%;Strict:false"));
        assert_eq!(case.additional("passCondition"), Some("detected count less than 1"));
        assert_eq!(case.additional("finishCondition"), Some("0"));
    }

    #[test]
    fn test_score_lookup() {
        let map = ScoreMap1D { u: vec![0.0, 1.0, 3.0], y: vec![100.0, 60.0, 0.0] };
        assert_eq!(lookup_score_from_map_1d(&map, -1.0), 100.0);
        assert_eq!(lookup_score_from_map_1d(&map, 0.0), 100.0);
        assert_eq!(lookup_score_from_map_1d(&map, 0.5), 80.0);
        assert_eq!(lookup_score_from_map_1d(&map, 1.0), 60.0);
        assert_eq!(lookup_score_from_map_1d(&map, 2.0), 30.0);
        assert_eq!(lookup_score_from_map_1d(&map, 3.0), 0.0);
        assert_eq!(lookup_score_from_map_1d(&map, 9.0), 0.0);
    }

    #[test]
    fn test_score_lookup_malformed() {
        let short = ScoreMap1D { u: vec![0.0], y: vec![1.0] };
        assert_eq!(lookup_score_from_map_1d(&short, 0.0), UNSET);
        let mismatched = ScoreMap1D { u: vec![0.0, 1.0], y: vec![1.0] };
        assert_eq!(lookup_score_from_map_1d(&mismatched, 0.0), UNSET);
        let unordered = ScoreMap1D { u: vec![1.0, 1.0], y: vec![1.0, 2.0] };
        assert_eq!(lookup_score_from_map_1d(&unordered, 1.0), UNSET);
    }

    #[test]
    fn test_score_case() {
        let mut kpi = EvalKpi::new("K");
        kpi.parameters.score_map_1d = Some(ScoreMap1D { u: vec![0.0, 2.0], y: vec![100.0, 0.0] });
        let mut case = ReportCase::default();
        case.info.detected_count = 1;
        case.set_test_result(TestState::Pass, "", UNSET, UNSET);
        score_case_by_pass_condition(&kpi, &mut case);
        assert_eq!(case.info.result.as_ref().unwrap().score, 50.0);
    }

    #[test]
    fn test_axis_statistics() {
        let axis = Axis { data: vec![1.0, 2.0, 3.0, 4.0], ..Axis::default() };
        assert_eq!(axis_average(&axis), 2.5);
        assert_eq!(axis_variance(&axis), 1.25);
        assert_eq!(axis_variance(&Axis::default()), 0.0);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = TestReport::new("scene", 100.0);
        report.set_end_second(112.5);
        assert_eq!(report.duration_second, 12.5);
        let mut case = ReportCase::default();
        case.add_xy_plot(XyPlot::new("p", "", "t", "s", &[("y", "")]));
        report.cases.push(case);
        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"xy_plot\""));
        assert!(json.contains("\"scene_name\": \"scene\""));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TestState::Pass.to_string(), "pass");
        assert_eq!(TestState::Undefined.to_string(), "undefined");
    }
}
